//! gdrive2sheet CLI - Print or export the Google Drive files shared with you.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::{debug, info};

use gdrive2sheet::auth::SHEETS_SCOPES;
use gdrive2sheet::printer::print_table;
use gdrive2sheet::{
    AppPaths, CredentialStore, DriveClient, ListOptions, OperationMode, RowConverter,
    ServiceAccountAuth, SheetOptions, SheetWriter, HEADERS,
};

/// List files shared with you on Google Drive.
#[derive(Parser, Debug)]
#[command(name = "gdrive2sheet")]
#[command(author, version, about, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["print", "gsheet"])))]
struct Cli {
    /// More verbose log.
    #[arg(short, long)]
    verbose: bool,

    /// Print results to console.
    #[arg(short, long, num_args = 1.., value_name = "LABELS")]
    print: Option<Vec<String>>,

    /// Export values to Google sheet. Additional gsheet arguments need to be specified.
    #[arg(
        short,
        long,
        requires_all = ["gsheet_client_secret", "gsheet_spreadsheet", "gsheet_worksheet"]
    )]
    gsheet: bool,

    /// Service account credentials for accessing the Google Sheets API.
    #[arg(long, help_heading = "Google sheet")]
    gsheet_client_secret: Option<PathBuf>,

    /// Name of the spreadsheet.
    #[arg(long, help_heading = "Google sheet")]
    gsheet_spreadsheet: Option<String>,

    /// Name of the worksheet in the spreadsheet.
    #[arg(long, help_heading = "Google sheet")]
    gsheet_worksheet: Option<String>,

    /// OAuth client secret used for the Drive login.
    #[arg(long, env = "GDRIVE2SHEET_CREDENTIALS", default_value = "credentials.json")]
    credentials: PathBuf,

    /// Token cache file.
    #[arg(long, env = "GDRIVE2SHEET_TOKEN_FILE", default_value = "token.json")]
    token_file: PathBuf,

    /// Number of files requested per page.
    #[arg(long, default_value_t = 100)]
    page_size: u32,
}

impl Cli {
    fn operation_mode(&self) -> Result<OperationMode> {
        if let Some(labels) = &self.print {
            return Ok(OperationMode::Print {
                labels: labels.clone(),
            });
        }

        match (
            &self.gsheet_client_secret,
            &self.gsheet_spreadsheet,
            &self.gsheet_worksheet,
        ) {
            (Some(client_secret), Some(spreadsheet), Some(worksheet)) if self.gsheet => {
                Ok(OperationMode::Gsheet(SheetOptions {
                    client_secret: client_secret.clone(),
                    spreadsheet: spreadsheet.clone(),
                    worksheet: worksheet.clone(),
                }))
            }
            _ => anyhow::bail!("--gsheet requires all of the --gsheet-* options"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let start = Instant::now();
    let cli = Cli::parse();
    let mode = cli.operation_mode()?;

    let paths = AppPaths::from_home();
    paths
        .ensure_created()
        .with_context(|| format!("Failed to create {:?}", paths.project_out_root))?;
    let _log_guard = gdrive2sheet::logging::init_logging(&paths.log_dir, cli.verbose);

    info!("Using operation mode: {}", mode);

    let writer = match &mode {
        OperationMode::Gsheet(options) => {
            debug!("Sheet options: {}", options);
            let auth = ServiceAccountAuth::from_file(&options.client_secret, SHEETS_SCOPES)
                .with_context(|| {
                    format!("Failed to load credentials from {:?}", options.client_secret)
                })?;
            info!("Writing to Google sheets as {}", auth.client_email());
            Some(SheetWriter::new(
                Arc::new(auth),
                options.spreadsheet.clone(),
                options.worksheet.clone(),
            ))
        }
        OperationMode::Print { labels } => {
            debug!(?labels, "Print labels");
            None
        }
    };

    let store = Arc::new(CredentialStore::new(&cli.credentials, &cli.token_file));
    debug!("Token cache: {:?}", store.token_path());
    store
        .authorize()
        .await
        .context("Failed to authorize Google Drive access")?;

    let client = DriveClient::new(store);
    let options = ListOptions {
        page_size: cli.page_size,
        ..ListOptions::default()
    };
    let files = client
        .get_shared_files(&options)
        .await
        .context("Failed to list shared files")?;
    for file in &files {
        debug!("Shared file: {}", file);
    }

    let mut converter = RowConverter::new(mode.truncate());
    let rows = converter.convert(&files)?;

    match writer {
        Some(writer) => {
            info!("Updating Google sheet with results...");
            writer
                .write_data(&HEADERS, &rows)
                .await
                .context("Failed to update Google sheet")?;
        }
        None => print_table(&HEADERS, &rows),
    }

    info!(
        "Execution of script took {} seconds",
        start.elapsed().as_secs()
    );
    Ok(())
}
