//! Mapping of raw files.list items into [`DriveFile`] records.

use unicode_normalization::UnicodeNormalization;

use crate::error::{Result, SyncError};
use crate::models::{DriveFile, DriveUser, RawFileItem, RawUser, UNKNOWN_USER};

/// Punctuation kept by [`sanitize`] besides ASCII letters and digits.
const ALLOWED_PUNCTUATION: &str = "-_.() ";

/// Reduce a display string to ASCII letters, digits and `-_.() `.
///
/// Characters are decomposed first so accented letters keep their base letter.
pub fn sanitize(value: &str) -> String {
    value
        .nfd()
        .filter(|c| c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(*c))
        .collect()
}

/// Build a user record, substituting the sentinel for absent fields.
pub fn normalize_user(raw: &RawUser) -> DriveUser {
    DriveUser {
        email: raw
            .email_address
            .clone()
            .unwrap_or_else(|| UNKNOWN_USER.to_string()),
        name: sanitize(raw.display_name.as_deref().unwrap_or(UNKNOWN_USER)),
    }
}

/// Convert one raw item into a file record. Missing required fields are fatal.
pub fn normalize_item(item: RawFileItem) -> Result<DriveFile> {
    let id = item.id.ok_or(SyncError::MissingField {
        field: "id",
        id: UNKNOWN_USER.to_string(),
    })?;

    let missing = |field: &'static str| SyncError::MissingField {
        field,
        id: id.clone(),
    };

    let name = item.name.ok_or_else(|| missing("name"))?;
    let mime_type = item.mime_type.ok_or_else(|| missing("mimeType"))?;
    let link = item.web_view_link.ok_or_else(|| missing("webViewLink"))?;
    let created_date = item.created_time.ok_or_else(|| missing("createdTime"))?;
    let modified_date = item.modified_time.ok_or_else(|| missing("modifiedTime"))?;
    let shared_with_me_date = item
        .shared_with_me_time
        .ok_or_else(|| missing("sharedWithMeTime"))?;
    let owners = item
        .owners
        .ok_or_else(|| missing("owners"))?
        .iter()
        .map(normalize_user)
        .collect();

    let sharing_user = item
        .sharing_user
        .as_ref()
        .map(normalize_user)
        .unwrap_or_else(DriveUser::unknown);

    Ok(DriveFile {
        name: sanitize(&name),
        id,
        mime_type,
        link,
        created_date,
        modified_date,
        shared_with_me_date,
        owners,
        sharing_user,
    })
}
