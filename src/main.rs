mod auth;
mod config;
mod console;
mod db;
mod invoice_gen;
mod invoicing;
mod jobs;
mod mailer;
mod marketing;
mod models;
mod ui;

use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::invoice_gen::InvoiceGenerator;
use crate::jobs::{JobContext, MarketingJob, RecurringInvoiceJob, Scheduler};
use crate::mailer::{Mailer, SmtpMailer, UnconfiguredMailer};

#[derive(Parser)]
#[command(name = "backoffice", about = "Client, invoice and marketing back office")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy, PartialEq, Debug)]
enum Command {
    /// Open the admin console (default)
    Console,
    /// Run the recurring invoice and marketing jobs on their cron schedules
    Scheduler,
    /// Run one job immediately and exit
    Run {
        #[arg(value_enum)]
        job: JobKind,
    },
    /// Render and email a single invoice
    SendInvoice {
        id: i32,
    },
    /// Apply database migrations
    Migrate,
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Debug)]
enum JobKind {
    Recurring,
    Marketing,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Console);

    let config = config::init()?;
    init_tracing(&config, command == Command::Console)?;

    let db = db::init(&config).await?;
    if command == Command::Migrate {
        db.migrate().await?;
        info!("migrations applied");
        return Ok(());
    }

    let ctx = build_context(&config, Arc::new(db))?;

    match command {
        Command::Console => console::run(config, ctx).await?,
        Command::Scheduler => {
            Scheduler::new(&config, ctx).await?.run_until_shutdown().await?;
        }
        Command::Run { job } => {
            let now = Utc::now();
            let (name, report) = match job {
                JobKind::Recurring => ("recurring_invoices", RecurringInvoiceJob::new(ctx).run(now).await?),
                JobKind::Marketing => ("marketing", MarketingJob::new(ctx).run(now).await?),
            };
            report.log(name);
        }
        Command::SendInvoice { id } => {
            ctx.dispatcher()
                .send_invoice(ctx.store.as_ref(), id)
                .await?;
        }
        Command::Migrate => {}
    }

    Ok(())
}

/// The console owns the terminal, so its logs go to a file. Batch commands
/// log to stderr.
fn init_tracing(config: &Config, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if to_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("failed to open log file {}", config.log_file))?;
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to initialise logging: {e}"))
}

fn build_context(config: &Config, store: Arc<dyn db::Store>) -> Result<JobContext> {
    let mailer: Arc<dyn Mailer> = match SmtpMailer::from_settings(config.smtp()) {
        Ok(mailer) => Arc::new(mailer),
        Err(e) => {
            warn!(error = %e, "SMTP unavailable, emails will fail until it is configured");
            Arc::new(UnconfiguredMailer)
        }
    };
    let generator = Arc::new(InvoiceGenerator::new(&config.pdf_output_dir)?);

    Ok(JobContext::new(config, store, mailer, generator))
}
