//! Run command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use sfexport::{ExportConfig, Exporter, RetryPolicy, Session};
use sfexport_core::{ApiVersion, Credentials};
use sfexport_rest::{RestApi, RestClient, SObjectName, SoapLogin};

use crate::output;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Login username
    #[arg(long, env = "SFEXPORT_USERNAME")]
    pub username: String,

    /// Login password
    #[arg(long, env = "SFEXPORT_PASSWORD", hide_env_values = true)]
    pub password: String,

    /// Security token appended to the password
    #[arg(long, env = "SFEXPORT_SECURITY_TOKEN", hide_env_values = true)]
    pub security_token: Option<String>,

    /// SOAP login endpoint
    #[arg(long, default_value = "https://login.salesforce.com/services/Soap/u/57.0")]
    pub login_url: String,

    /// REST API version
    #[arg(long, default_value = "62.0")]
    pub api_version: String,

    /// Object type to export
    #[arg(long, default_value = "Attachment")]
    pub sobject: String,

    /// Directory receiving the downloaded files
    #[arg(long, default_value = "attachments")]
    pub output_dir: PathBuf,

    /// Checkpoint file
    #[arg(long, default_value = "last_marker.json")]
    pub checkpoint: PathBuf,

    /// Metadata ledger (CSV)
    #[arg(long, default_value = "attachments_metadata.csv")]
    pub ledger: PathBuf,

    /// Parallel downloads per page
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: u16,

    /// Retries per download after the first attempt
    #[arg(long, default_value_t = 5)]
    pub retries: u32,

    /// Records per page (1-2000)
    #[arg(long, default_value_t = 200, value_parser = clap::value_parser!(u32).range(1..=2000))]
    pub batch_size: u32,

    /// First retry delay in milliseconds; doubles on every retry
    #[arg(long, default_value_t = 1000)]
    pub retry_base_ms: u64,

    /// Stop after this many pages
    #[arg(long)]
    pub max_pages: Option<u64>,
}

impl RunArgs {
    fn export_config(&self) -> ExportConfig {
        ExportConfig {
            output_dir: self.output_dir.clone(),
            checkpoint_path: self.checkpoint.clone(),
            ledger_path: self.ledger.clone(),
            concurrency: usize::from(self.concurrency),
            batch_size: self.batch_size,
            max_pages: self.max_pages,
            retry: RetryPolicy {
                max_retries: self.retries,
                base_delay: Duration::from_millis(self.retry_base_ms),
                ..RetryPolicy::default()
            },
        }
    }

    fn credentials(&self) -> Credentials {
        let credentials = Credentials::new(&self.username, &self.password);
        match &self.security_token {
            Some(token) => credentials.with_security_token(token),
            None => credentials,
        }
    }
}

pub async fn run(args: RunArgs) -> Result<()> {
    let api_version = ApiVersion::new(&args.api_version).context("Invalid API version")?;
    let sobject = SObjectName::new(&args.sobject).context("Invalid object type")?;
    let config = args.export_config();
    config.validate().context("Invalid configuration")?;

    let client = RestClient::new().context("Failed to create HTTP client")?;

    eprintln!("{}", "Logging in...".dimmed());
    let login = SoapLogin::new(client.clone(), &args.login_url, args.credentials());
    let session = Session::login(login).await.context("Failed to login")?;
    output::success("Logged in");

    let api = Arc::new(RestApi::new(client, api_version, sobject));
    let exporter = Exporter::new(config, Arc::clone(&api), api, session)
        .await
        .context("Failed to prepare export")?;

    let summary = exporter.run().await.context("Export aborted")?;
    output::summary(&summary);

    Ok(())
}
