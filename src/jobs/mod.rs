//! Background jobs: recurring invoice generation and repeat marketing sends.
//!
//! Jobs are plain structs with a `run(now)` method so they can be driven by
//! the cron scheduler, the `run` subcommand, or tests.

pub mod marketing;
pub mod recurring;
pub mod scheduler;

use std::sync::Arc;

use thiserror::Error;
use tokio_cron_scheduler::JobSchedulerError;
use tracing::{info, warn};

use crate::config::{CompanyProfile, Config};
use crate::db::Store;
use crate::invoice_gen::InvoiceGenerator;
use crate::invoicing::Dispatcher;
use crate::mailer::Mailer;

pub use marketing::MarketingJob;
pub use recurring::RecurringInvoiceJob;
pub use scheduler::Scheduler;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("scheduler error: {0}")]
    Scheduler(#[from] JobSchedulerError),
    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
    #[error("failed to listen for shutdown signal: {0}")]
    Signal(#[from] std::io::Error),
}

pub type JobResult<T> = Result<T, JobError>;

/// Outcome of one job run. Item failures are collected, not raised.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct JobReport {
    pub processed: usize,
    pub succeeded: usize,
    pub errors: Vec<String>,
}

impl JobReport {
    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn log(&self, job: &str) {
        if self.errors.is_empty() {
            info!(job, processed = self.processed, succeeded = self.succeeded, "job finished");
        } else {
            warn!(
                job,
                processed = self.processed,
                succeeded = self.succeeded,
                failed = self.failed(),
                errors = ?self.errors,
                "job finished with errors"
            );
        }
    }
}

/// Shared handles every job needs.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub generator: Arc<InvoiceGenerator>,
    pub company: CompanyProfile,
    pub currency: String,
    pub payment_terms_days: i64,
}

impl JobContext {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        generator: Arc<InvoiceGenerator>,
    ) -> Self {
        Self {
            store,
            mailer,
            generator,
            company: config.company(),
            currency: config.currency_symbol.clone(),
            payment_terms_days: config.payment_terms_days,
        }
    }

    pub fn dispatcher(&self) -> Dispatcher<'_> {
        Dispatcher {
            generator: &self.generator,
            mailer: self.mailer.as_ref(),
            company: &self.company,
            currency: &self.currency,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use super::JobContext;
    use crate::config::test_config;
    use crate::db::memory::MemoryStore;
    use crate::invoice_gen::InvoiceGenerator;
    use crate::mailer::testing::RecordingMailer;

    pub struct Harness {
        pub store: Arc<MemoryStore>,
        pub mailer: Arc<RecordingMailer>,
        pub ctx: JobContext,
        pub dir: tempfile::TempDir,
    }

    pub fn harness() -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let generator = Arc::new(InvoiceGenerator::new(dir.path()).unwrap());
        let ctx = JobContext::new(&test_config(), store.clone(), mailer.clone(), generator);
        Harness {
            store,
            mailer,
            ctx,
            dir,
        }
    }
}
