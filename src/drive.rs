//! Google Drive API client listing the files shared with the user.

use std::sync::Arc;

use reqwest::{Client, Response};
use tracing::{debug, info, warn};

use crate::auth::TokenProvider;
use crate::error::{Result, SyncError};
use crate::models::{ApiErrorResponse, DriveFile, FileListResponse, RawFileItem};
use crate::normalize::normalize_item;

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Files shared with the current user.
pub const Q_SHARED_WITH_ME: &str = "sharedWithMe";

/// Most recently shared first.
pub const ORDER_BY_DEFAULT: &str = "sharedWithMeTime desc";

/// File fields requested by default. Reference:
/// https://developers.google.com/drive/api/v3/reference/files#resource
pub const DEFAULT_FILE_FIELDS: &str = concat!(
    "id, name, mimeType, webViewLink, createdTime, modifiedTime, ",
    "sharedWithMeTime, owners, sharingUser"
);

/// Parameters of a files.list traversal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub page_size: u32,
    /// Comma separated file fields, without the `files(...)` wrapper.
    pub fields: String,
    pub order_by: String,
    pub query: String,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page_size: 100,
            fields: DEFAULT_FILE_FIELDS.to_string(),
            order_by: ORDER_BY_DEFAULT.to_string(),
            query: Q_SHARED_WITH_ME.to_string(),
        }
    }
}

/// Wrap a file field projection so the page token is returned as well.
pub fn fields_with_pagination(fields: &str) -> String {
    format!("nextPageToken, files({})", fields)
}

/// Client for the Drive files.list endpoint.
pub struct DriveClient {
    auth: Arc<dyn TokenProvider>,
    http: Client,
    base_url: String,
}

impl DriveClient {
    /// Create a new DriveClient against the public Drive API.
    pub fn new(auth: Arc<dyn TokenProvider>) -> Self {
        Self {
            auth,
            http: Client::new(),
            base_url: DRIVE_API_BASE.to_string(),
        }
    }

    /// Point the client at another API root (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// List every file matching `options`, following page tokens until exhausted.
    pub async fn list_shared_files(&self, options: &ListOptions) -> Result<Vec<RawFileItem>> {
        let token = self.auth.access_token().await?;
        let fields = fields_with_pagination(&options.fields);
        let page_size = options.page_size.to_string();

        let mut all_files = Vec::new();
        let mut page_token: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut request = self
                .http
                .get(format!("{}/files", self.base_url))
                .bearer_auth(&token)
                .query(&[
                    ("q", options.query.as_str()),
                    ("pageSize", page_size.as_str()),
                    ("fields", fields.as_str()),
                    ("orderBy", options.order_by.as_str()),
                ]);

            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(api_error(response).await);
            }

            let list_response: FileListResponse = response.json().await?;
            pages += 1;

            match list_response.files {
                Some(files) => {
                    debug!(page = pages, items = files.len(), "Fetched page");
                    all_files.extend(files);
                }
                None => warn!(page = pages, "No files found in page"),
            }

            match list_response.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        info!(files = all_files.len(), pages, "Listed shared files");
        Ok(all_files)
    }

    /// List and normalize every file shared with the user.
    pub async fn get_shared_files(&self, options: &ListOptions) -> Result<Vec<DriveFile>> {
        self.list_shared_files(options)
            .await?
            .into_iter()
            .map(normalize_item)
            .collect()
    }
}

/// Turn a non-success response into an `ApiError`, preferring the Google error envelope.
pub(crate) async fn api_error(response: Response) -> SyncError {
    let status = response.status();
    let error_body = response.text().await.unwrap_or_default();
    if let Ok(api_error) = serde_json::from_str::<ApiErrorResponse>(&error_body) {
        return SyncError::ApiError {
            status: api_error.error.code,
            message: api_error.error.message,
        };
    }
    SyncError::ApiError {
        status: status.as_u16(),
        message: error_body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_with_pagination() {
        assert_eq!(
            fields_with_pagination("id, name"),
            "nextPageToken, files(id, name)"
        );
    }

    #[test]
    fn test_default_list_options() {
        let options = ListOptions::default();
        assert_eq!(options.page_size, 100);
        assert_eq!(options.order_by, "sharedWithMeTime desc");
        assert_eq!(options.query, "sharedWithMe");
        assert!(options.fields.contains("sharingUser"));
    }
}
