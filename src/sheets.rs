//! Replace-all writes of table rows into a Google Sheets worksheet.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use tracing::{debug, info};

use crate::auth::TokenProvider;
use crate::drive::{api_error, DRIVE_API_BASE};
use crate::error::{Result, SyncError};
use crate::models::{
    Spreadsheet, SpreadsheetFile, SpreadsheetFileList, UpdateValuesResponse, ValueRange,
};

/// Base URL for Google Sheets API v4.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Range cleared before every write.
pub const RANGE_TO_CLEAR: &str = "A1:Z1000";

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// Where to write: service account key plus spreadsheet and worksheet titles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetOptions {
    pub client_secret: PathBuf,
    pub spreadsheet: String,
    pub worksheet: String,
}

impl fmt::Display for SheetOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SheetOptions {{ spreadsheet: {}, worksheet: {} }}",
            self.spreadsheet, self.worksheet
        )
    }
}

/// Column letters in A1 notation for a 1-based column index (1 -> A, 27 -> AA).
pub fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    while index > 0 {
        let rem = (index - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        index = (index - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Quote a worksheet title for use in an A1 range.
fn quote_sheet_name(name: &str) -> String {
    format!("'{}'", name.replace('\'', "''"))
}

/// Escape a value for a single-quoted string in a Drive `q` expression.
fn drive_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Writes a header and rows over a worksheet, clearing it first.
///
/// The clear and the write are separate calls: a failure between them
/// leaves the worksheet empty.
pub struct SheetWriter {
    auth: Arc<dyn TokenProvider>,
    http: Client,
    drive_base: String,
    sheets_base: String,
    spreadsheet: String,
    worksheet: String,
}

impl SheetWriter {
    pub fn new(
        auth: Arc<dyn TokenProvider>,
        spreadsheet: impl Into<String>,
        worksheet: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            http: Client::new(),
            drive_base: DRIVE_API_BASE.to_string(),
            sheets_base: SHEETS_API_BASE.to_string(),
            spreadsheet: spreadsheet.into(),
            worksheet: worksheet.into(),
        }
    }

    /// Point the writer at other API roots (used by tests).
    pub fn with_base_urls(
        mut self,
        drive_base: impl Into<String>,
        sheets_base: impl Into<String>,
    ) -> Self {
        self.drive_base = drive_base.into();
        self.sheets_base = sheets_base.into();
        self
    }

    /// Find the spreadsheet by title. The first match wins.
    async fn find_spreadsheet(&self, token: &str) -> Result<SpreadsheetFile> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            drive_query_literal(&self.spreadsheet),
            SPREADSHEET_MIME_TYPE
        );

        let response = self
            .http
            .get(format!("{}/files", self.drive_base))
            .bearer_auth(token)
            .query(&[("q", query.as_str()), ("fields", "files(id, name)")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let list: SpreadsheetFileList = response.json().await?;
        list.files
            .into_iter()
            .next()
            .ok_or_else(|| SyncError::SpreadsheetNotFound(self.spreadsheet.clone()))
    }

    async fn get_spreadsheet(&self, token: &str, spreadsheet_id: &str) -> Result<Spreadsheet> {
        let response = self
            .http
            .get(format!("{}/spreadsheets/{}", self.sheets_base, spreadsheet_id))
            .bearer_auth(token)
            .query(&[(
                "fields",
                "spreadsheetId,properties.title,sheets.properties(sheetId,title)",
            )])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn clear_range(&self, token: &str, spreadsheet_id: &str, range: &str) -> Result<()> {
        let response = self
            .http
            .post(format!(
                "{}/spreadsheets/{}/values/{}:clear",
                self.sheets_base,
                spreadsheet_id,
                urlencoding::encode(range)
            ))
            .bearer_auth(token)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(())
    }

    async fn update_range(
        &self,
        token: &str,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<String>>,
    ) -> Result<UpdateValuesResponse> {
        let body = ValueRange {
            range: range.to_string(),
            major_dimension: "ROWS".to_string(),
            values,
        };

        let response = self
            .http
            .put(format!(
                "{}/spreadsheets/{}/values/{}",
                self.sheets_base,
                spreadsheet_id,
                urlencoding::encode(range)
            ))
            .bearer_auth(token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Replace the worksheet contents with `header` followed by `rows`.
    ///
    /// Fails before touching any cell if the spreadsheet or worksheet is missing.
    pub async fn write_data(
        &self,
        header: &[&str],
        rows: &[Vec<String>],
    ) -> Result<UpdateValuesResponse> {
        let token = self.auth.access_token().await?;

        let file = self.find_spreadsheet(&token).await?;
        let spreadsheet = self.get_spreadsheet(&token, &file.id).await?;
        let worksheet = spreadsheet
            .sheets
            .iter()
            .find(|s| s.properties.title == self.worksheet)
            .ok_or_else(|| SyncError::WorksheetNotFound(self.worksheet.clone()))?;
        debug!(
            spreadsheet_id = %file.id,
            sheet_id = ?worksheet.properties.sheet_id,
            "Opened worksheet"
        );

        let sheet_title = &spreadsheet.properties.title;
        let worksheet_title = &worksheet.properties.title;
        let quoted = quote_sheet_name(worksheet_title);

        let mut values = Vec::with_capacity(rows.len() + 1);
        values.push(header.iter().map(|h| h.to_string()).collect::<Vec<_>>());
        values.extend(rows.iter().cloned());

        info!(
            "Clearing all values from sheet '{}', worksheet: '{}', range: '{}'",
            sheet_title, worksheet_title, RANGE_TO_CLEAR
        );
        self.clear_range(&token, &file.id, &format!("{}!{}", quoted, RANGE_TO_CLEAR))
            .await?;

        let range_to_update = format!("A1:{}{}", column_letter(header.len()), values.len());
        info!(
            "Adding values to sheet '{}', worksheet: '{}', range: '{}'",
            sheet_title, worksheet_title, range_to_update
        );
        let response = self
            .update_range(&token, &file.id, &format!("{}!A1", quoted), values)
            .await?;

        debug!(
            updated_range = ?response.updated_range,
            updated_rows = ?response.updated_rows,
            updated_cells = ?response.updated_cells,
            "Sheet updated"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(5), "E");
        assert_eq!(column_letter(26), "Z");
        assert_eq!(column_letter(27), "AA");
        assert_eq!(column_letter(52), "AZ");
        assert_eq!(column_letter(0), "");
    }

    #[test]
    fn test_quote_sheet_name() {
        assert_eq!(quote_sheet_name("Shared"), "'Shared'");
        assert_eq!(quote_sheet_name("Bob's files"), "'Bob''s files'");
    }

    #[test]
    fn test_drive_query_literal() {
        assert_eq!(drive_query_literal("Shared files"), "Shared files");
        assert_eq!(drive_query_literal("Bob's files"), r"Bob\'s files");
        assert_eq!(drive_query_literal(r"C:\reports"), r"C:\\reports");
        assert_eq!(drive_query_literal(r"a\'b"), r"a\\\'b");
    }

    #[test]
    fn test_sheet_options_display_hides_secret() {
        let options = SheetOptions {
            client_secret: PathBuf::from("/secret/key.json"),
            spreadsheet: "Shared files".to_string(),
            worksheet: "Sheet1".to_string(),
        };
        let display = options.to_string();
        assert!(display.contains("Shared files"));
        assert!(display.contains("Sheet1"));
        assert!(!display.contains("key.json"));
    }
}
