//! gdrive2sheet - List the Google Drive files shared with you and export them.
//!
//! This library provides functionality to:
//! - Authorize against Google Drive with a cached user token
//! - List every file shared with the user, across pages
//! - Convert the listing into table rows, with optional truncation
//! - Print the rows as a console table or replace a worksheet with them
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gdrive2sheet::{CredentialStore, DriveClient, ListOptions, RowConverter, HEADERS};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(CredentialStore::new("credentials.json", "token.json"));
//!     store.authorize().await?;
//!
//!     let client = DriveClient::new(store);
//!     let files = client.get_shared_files(&ListOptions::default()).await?;
//!
//!     let rows = RowConverter::new(true).convert(&files)?;
//!     gdrive2sheet::printer::print_table(&HEADERS, &rows);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod convert;
pub mod credential_store;
pub mod drive;
pub mod error;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod printer;
pub mod sheets;

// Re-exports for convenience
pub use auth::{ServiceAccountAuth, TokenProvider};
pub use config::{AppPaths, OperationMode};
pub use convert::{RowConverter, RowStats, HEADERS};
pub use credential_store::{BrowserDelegate, CredentialStore, LoginDelegate};
pub use drive::{DriveClient, ListOptions};
pub use error::{Result, SyncError};
pub use models::{DriveFile, DriveUser};
pub use sheets::{SheetOptions, SheetWriter};
