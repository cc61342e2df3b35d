//! services/tracker/src/bin/campaign.rs
//!
//! Operator command for campaigns:
//!
//! ```text
//! campaign send <recipients.csv> [--ignore-duplicates]
//! campaign resend <failures.csv>
//! campaign reset-targets <target-id>...
//! campaign reset-pools <pool-id>...
//! ```

use chrono::Local;
use clap::{Parser, Subcommand};
use phishing_core::ports::{MessageSender, PoolStore, TargetStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracker_lib::{
    adapters::{LogSender, PgStore, SmtpSender},
    config::Config,
    dispatch::{
        assign_templates, failure_log_name, load_templates, parse_failures, parse_recipients,
        write_failures, DispatchReport, Dispatcher,
    },
    error::ApiError,
};

/// Campaign dispatch and administrative resets
#[derive(Parser, Debug)]
#[command(name = "campaign")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Create targets and pools for every recipient and send the campaign
    Send {
        /// CSV file of `address,group` rows
        recipients: PathBuf,

        /// Allow an address to appear more than once
        #[arg(long)]
        ignore_duplicates: bool,
    },

    /// Retry the deliveries listed in a failure log
    Resend {
        /// Failure log written by a previous `send` or `resend`
        failures: PathBuf,
    },

    /// Clear every milestone of the given targets
    ResetTargets {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Zero every counter of the given pools
    ResetPools {
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

fn save_failures(report: &DispatchReport) -> Result<(), ApiError> {
    if report.failures.is_empty() {
        info!("Done. All {} emails sent.", report.sent);
        return Ok(());
    }
    let path = failure_log_name(Local::now());
    write_failures(std::fs::File::create(&path)?, &report.failures)?;
    error!(
        "Done. However, {} emails could not be sent.",
        report.failures.len()
    );
    warn!("Use 'campaign resend {}' to retry.", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- 2. Connect to Database ---
    let store = Arc::new(
        PgStore::connect(config.require_database_url()?, config.database_max_connections).await?,
    );
    store.run_migrations().await?;

    // --- 3. Run the Command ---
    match cli.command {
        Command::ResetTargets { ids } => {
            let reset = store.reset_targets(&ids).await?;
            info!("Reset {} of {} targets.", reset, ids.len());
        }
        Command::ResetPools { ids } => {
            let reset = store.reset_pools(&ids).await?;
            info!("Reset {} of {} pools.", reset, ids.len());
        }
        Command::Send { recipients, ignore_duplicates } => {
            let dispatcher = dispatcher(&config, store)?;
            let groups = parse_recipients(&std::fs::read_to_string(&recipients)?, ignore_duplicates)?;
            info!("Found {} groups:", groups.len());
            for (group, addresses) in &groups {
                info!(" * {:?} ({} addresses)", group, addresses.len());
            }

            let names = dispatcher.template_names();
            info!("Found {} templates: {:?}", names.len(), names);

            let assignments = assign_templates(groups, &names, &mut rand::thread_rng());
            info!("Let the phishing begin!");
            let report = dispatcher.send_campaign(&assignments).await?;
            save_failures(&report)?;
        }
        Command::Resend { failures } => {
            let dispatcher = dispatcher(&config, store)?;
            let failures = parse_failures(&std::fs::read_to_string(&failures)?)?;
            info!("Found {} failures.", failures.len());
            let report = dispatcher.resend(&failures).await?;
            save_failures(&report)?;
        }
    }

    Ok(())
}

fn dispatcher(config: &Config, store: Arc<PgStore>) -> Result<Dispatcher, ApiError> {
    let templates = load_templates(&config.templates_path)?;
    let sender: Arc<dyn MessageSender> = match &config.smtp_url {
        Some(url) => Arc::new(SmtpSender::from_url(url)?),
        None => {
            warn!("SMTP_URL is not set, no actual email will be sent!");
            Arc::new(LogSender)
        }
    };
    Ok(Dispatcher::new(store.clone(), store, sender, templates))
}
