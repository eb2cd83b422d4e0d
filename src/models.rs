//! Data models for Google Drive and Google Sheets API payloads.

use serde::{Deserialize, Serialize};

/// Sentinel used when a user record lacks an email or display name.
pub const UNKNOWN_USER: &str = "unknown";

/// A user sub-record as returned by the files.list API (owners, sharingUser).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    #[serde(default)]
    pub email_address: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// One entry of a files.list page. Every field is optional on the wire;
/// the normalizer decides which absences are fatal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFileItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
    #[serde(default)]
    pub shared_with_me_time: Option<String>,
    #[serde(default)]
    pub owners: Option<Vec<RawUser>>,
    #[serde(default)]
    pub sharing_user: Option<RawUser>,
}

/// Response from the files.list API endpoint.
///
/// `files` stays an `Option` so a page without the key can be told apart
/// from an explicitly empty one.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileListResponse {
    #[serde(default)]
    pub files: Option<Vec<RawFileItem>>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Normalized user record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveUser {
    pub email: String,
    pub name: String,
}

impl DriveUser {
    /// The user substituted when a file has no sharing user.
    pub fn unknown() -> Self {
        Self {
            email: UNKNOWN_USER.to_string(),
            name: UNKNOWN_USER.to_string(),
        }
    }
}

/// Normalized metadata of one file shared with the current user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub link: String,
    pub created_date: String,
    pub modified_date: String,
    pub shared_with_me_date: String,
    pub owners: Vec<DriveUser>,
    pub sharing_user: DriveUser,
}

impl DriveFile {
    /// Owner display names joined with a comma.
    pub fn owner_names(&self) -> String {
        self.owners
            .iter()
            .map(|o| o.name.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl std::fmt::Display for DriveFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Google API error response.
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorDetail {
    pub code: u16,
    pub message: String,
}

/// Service account credentials from JSON file.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: Option<String>,
}

/// OAuth client secret of an installed (desktop) application.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientSecret {
    pub client_id: String,
    pub client_secret: String,
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".to_string()
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// Client secret file as downloaded from the Google Cloud console.
#[derive(Debug, Deserialize)]
pub struct ClientSecretFile {
    #[serde(default)]
    pub installed: Option<ClientSecret>,
    #[serde(default)]
    pub web: Option<ClientSecret>,
}

impl ClientSecretFile {
    pub fn into_secret(self) -> Option<ClientSecret> {
        self.installed.or(self.web)
    }
}

/// OAuth2 token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Token persisted in the token cache file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds).
    pub expires_at: Option<i64>,
    pub token_type: String,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// OAuth client the token was issued to, kept so a refresh does not
    /// need the client secret file.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl StoredToken {
    /// Check if the token is expired, with a 60 second buffer.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at <= chrono::Utc::now().timestamp() + 60,
            None => false,
        }
    }
}

/// Spreadsheet metadata, restricted to the fields the sheet writer asks for.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Spreadsheet {
    #[serde(default)]
    pub spreadsheet_id: Option<String>,
    pub properties: SpreadsheetProperties,
    #[serde(default)]
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Deserialize)]
pub struct SpreadsheetProperties {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct Sheet {
    pub properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SheetProperties {
    #[serde(default)]
    pub sheet_id: Option<i64>,
    pub title: String,
}

/// Body of a values.update request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    pub range: String,
    pub major_dimension: String,
    pub values: Vec<Vec<String>>,
}

/// Response of a values.update request.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateValuesResponse {
    #[serde(default)]
    pub updated_range: Option<String>,
    #[serde(default)]
    pub updated_rows: Option<u64>,
    #[serde(default)]
    pub updated_cells: Option<u64>,
}

/// Minimal Drive file entry used to look spreadsheets up by title.
#[derive(Debug, Deserialize)]
pub struct SpreadsheetFile {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct SpreadsheetFileList {
    #[serde(default)]
    pub files: Vec<SpreadsheetFile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_file_item_deserialize() {
        let json = r#"{
            "id": "abc123",
            "name": "report.pdf",
            "mimeType": "application/pdf",
            "webViewLink": "https://drive.google.com/file/d/abc123/view",
            "sharedWithMeTime": "2021-03-05T10:15:30.000Z",
            "owners": [{"displayName": "Jane", "emailAddress": "jane@example.com"}]
        }"#;

        let item: RawFileItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.id.as_deref(), Some("abc123"));
        assert_eq!(item.mime_type.as_deref(), Some("application/pdf"));
        assert_eq!(item.owners.as_ref().map(Vec::len), Some(1));
        assert!(item.sharing_user.is_none());
        assert!(item.created_time.is_none());
    }

    #[test]
    fn test_file_list_response_without_files_key() {
        let response: FileListResponse = serde_json::from_str("{}").unwrap();
        assert!(response.files.is_none());
        assert!(response.next_page_token.is_none());
    }

    #[test]
    fn test_client_secret_file_installed_and_web() {
        let installed: ClientSecretFile = serde_json::from_str(
            r#"{"installed": {"client_id": "id", "client_secret": "secret"}}"#,
        )
        .unwrap();
        let secret = installed.into_secret().unwrap();
        assert_eq!(secret.client_id, "id");
        assert_eq!(secret.token_uri, "https://oauth2.googleapis.com/token");

        let web: ClientSecretFile = serde_json::from_str(
            r#"{"web": {"client_id": "w", "client_secret": "s", "token_uri": "http://t"}}"#,
        )
        .unwrap();
        assert_eq!(web.into_secret().unwrap().token_uri, "http://t");
    }

    #[test]
    fn test_stored_token_expiry() {
        let now = chrono::Utc::now().timestamp();
        let mut token = StoredToken {
            access_token: "a".to_string(),
            refresh_token: None,
            expires_at: Some(now + 3600),
            token_type: "Bearer".to_string(),
            scopes: vec![],
            client_id: None,
            client_secret: None,
            token_uri: None,
        };
        assert!(!token.is_expired());

        token.expires_at = Some(now + 30);
        assert!(token.is_expired());

        token.expires_at = None;
        assert!(!token.is_expired());
    }

    #[test]
    fn test_drive_file_display_and_owners() {
        let file = DriveFile {
            id: "f1".to_string(),
            name: "Budget".to_string(),
            mime_type: "application/vnd.google-apps.spreadsheet".to_string(),
            link: "https://example.com".to_string(),
            created_date: String::new(),
            modified_date: String::new(),
            shared_with_me_date: String::new(),
            owners: vec![
                DriveUser {
                    email: "a@x".to_string(),
                    name: "Ann".to_string(),
                },
                DriveUser {
                    email: "b@x".to_string(),
                    name: "Bob".to_string(),
                },
            ],
            sharing_user: DriveUser::unknown(),
        };

        assert_eq!(format!("{}", file), "Budget (f1)");
        assert_eq!(file.owner_names(), "Ann,Bob");
    }
}
