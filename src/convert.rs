//! Conversion of file records into printable rows, with row statistics.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::error::{Result, SyncError};
use crate::models::DriveFile;

/// Column headers matching the rows produced by [`RowConverter`].
pub const HEADERS: [&str; 5] = ["Name", "Link", "Shared with me date", "Owner", "Type"];

/// Names longer than this are clipped and get an ellipsis in truncate mode.
pub const NAME_MAX_LEN: usize = 50;

/// Links are clipped to this many characters in truncate mode, without an ellipsis.
pub const LINK_MAX_LEN: usize = 20;

/// Timestamp format of the Drive API, e.g. `2021-03-05T10:15:30.000Z`.
const API_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

const FIELD_NAME: &str = "name";
const FIELD_LINK: &str = "link";
const FIELD_DATE: &str = "date";
const FIELD_OWNERS: &str = "owners";
const FIELD_TYPE: &str = "type";

/// Human readable label of a known mime type.
pub fn mime_label(mime_type: &str) -> Option<&'static str> {
    let label = match mime_type {
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => {
            "MS Presentation (pptx)"
        }
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
            "MS Word document (docx)"
        }
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
            "MS Excel spreadsheet (xlsx)"
        }
        "application/vnd.ms-powerpoint" => "MS Presentation (ppt)",
        "application/vnd.ms-excel" => "MS Excel spreadsheet (xls)",
        "application/msword" => "MS Word document (doc)",
        "application/pdf" => "PDF document",
        "application/x-apple-diskimage" => "Apple disk image",
        "application/zip" => "Zip file",
        "text/plain" => "Plain text file",
        "text/csv" => "CSV file",
        "image/jpeg" => "JPEG image",
        "image/png" => "PNG image",
        "image/gif" => "GIF image",
        "video/mp4" => "Video (mp4)",
        "application/vnd.google-apps.spreadsheet" => "Google sheet",
        "application/vnd.google-apps.folder" => "Google drive folder",
        "application/vnd.google-apps.document" => "Google doc",
        "application/vnd.google-apps.form" => "Google form",
        "application/vnd.google-apps.presentation" => "Google presentation",
        "application/vnd.google-apps.map" => "Google map",
        "application/vnd.google-apps.drawing" => "Google drawing",
        _ => return None,
    };
    Some(label)
}

/// Label for a mime type, or the mime type itself when it is not mapped.
pub fn mime_type_label(mime_type: &str) -> String {
    match mime_label(mime_type) {
        Some(label) => label.to_string(),
        None => {
            warn!(mime_type, "Mime type not found in mappings, using the raw value");
            mime_type.to_string()
        }
    }
}

/// Reduce an API timestamp to `YYYY-MM-DD`.
pub fn format_date(timestamp: &str) -> Result<String> {
    NaiveDateTime::parse_from_str(timestamp, API_DATE_FORMAT)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .map_err(|_| SyncError::InvalidTimestamp(timestamp.to_string()))
}

fn clip(value: &str, max_len: usize) -> String {
    value.chars().take(max_len).collect()
}

/// Clip a name to [`NAME_MAX_LEN`] characters plus `...`.
pub fn truncate_name(name: &str) -> String {
    if name.chars().count() > NAME_MAX_LEN {
        format!("{}...", clip(name, NAME_MAX_LEN))
    } else {
        name.to_string()
    }
}

/// Clip a link to [`LINK_MAX_LEN`] characters.
pub fn truncate_link(link: &str) -> String {
    clip(link, LINK_MAX_LEN)
}

/// Aggregates collected over the rows of one sync.
#[derive(Debug, Default)]
pub struct RowStats {
    longest_fields: BTreeMap<String, String>,
    longest_line: String,
    unique_fields: BTreeSet<String>,
    unique_values: BTreeMap<String, BTreeSet<String>>,
}

impl RowStats {
    /// Create stats collecting distinct values for `unique_fields`.
    pub fn new<I, S>(unique_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique_fields: unique_fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Record one row given as (field, value) pairs.
    pub fn update<'a, I>(&mut self, row: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut line = String::new();

        for (field, value) in row {
            line.push_str(value);

            let longer = self
                .longest_fields
                .get(field)
                .map_or(true, |current| value.chars().count() > current.chars().count());
            if longer {
                self.longest_fields
                    .insert(field.to_string(), value.to_string());
            }

            if self.unique_fields.contains(field) {
                self.unique_values
                    .entry(field.to_string())
                    .or_default()
                    .insert(value.to_string());
            }
        }

        if line.chars().count() > self.longest_line.chars().count() {
            self.longest_line = line;
        }
    }

    pub fn longest_field(&self, field: &str) -> Option<&str> {
        self.longest_fields.get(field).map(String::as_str)
    }

    pub fn longest_line(&self) -> &str {
        &self.longest_line
    }

    pub fn unique_values(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.unique_values.get(field)
    }

    /// Dump the collected stats at debug level.
    pub fn log(&self) {
        for (field, value) in &self.longest_fields {
            debug!(
                field = %field,
                len = value.chars().count(),
                value = %value,
                "Longest field value"
            );
        }
        debug!(
            len = self.longest_line.chars().count(),
            line = %self.longest_line,
            "Longest line"
        );
        for (field, values) in &self.unique_values {
            debug!(field = %field, count = values.len(), values = ?values, "Unique values");
        }
    }
}

/// Builds table rows from file records.
#[derive(Debug)]
pub struct RowConverter {
    truncate: bool,
    stats: RowStats,
}

impl RowConverter {
    /// `truncate` clips names, links and dates for console output.
    pub fn new(truncate: bool) -> Self {
        Self {
            truncate,
            stats: RowStats::new([FIELD_OWNERS, FIELD_TYPE]),
        }
    }

    /// Convert files into `[name, link, shared date, owners, type]` rows.
    pub fn convert(&mut self, files: &[DriveFile]) -> Result<Vec<Vec<String>>> {
        let rows = files
            .iter()
            .map(|file| self.convert_file(file))
            .collect::<Result<Vec<_>>>()?;
        self.stats.log();
        Ok(rows)
    }

    fn convert_file(&mut self, file: &DriveFile) -> Result<Vec<String>> {
        let owners = file.owner_names();
        let type_label = mime_type_label(&file.mime_type);

        self.stats.update([
            (FIELD_NAME, file.name.as_str()),
            (FIELD_LINK, file.link.as_str()),
            (FIELD_DATE, file.shared_with_me_date.as_str()),
            (FIELD_OWNERS, owners.as_str()),
            (FIELD_TYPE, type_label.as_str()),
        ]);

        let (name, link, date) = if self.truncate {
            (
                truncate_name(&file.name),
                truncate_link(&file.link),
                format_date(&file.shared_with_me_date)?,
            )
        } else {
            (
                file.name.clone(),
                file.link.clone(),
                file.shared_with_me_date.clone(),
            )
        };

        Ok(vec![name, link, date, owners, type_label])
    }

    pub fn stats(&self) -> &RowStats {
        &self.stats
    }
}
