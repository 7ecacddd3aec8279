use chrono::Utc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

use super::{JobContext, JobResult, MarketingJob, RecurringInvoiceJob};
use crate::config::Config;

/// Runs the recurring invoice and marketing jobs on their cron schedules.
pub struct Scheduler {
    inner: JobScheduler,
    ctx: JobContext,
    recurring_cron: String,
    marketing_cron: String,
}

impl Scheduler {
    pub async fn new(config: &Config, ctx: JobContext) -> JobResult<Self> {
        let inner = JobScheduler::new().await?;

        Ok(Self {
            inner,
            ctx,
            recurring_cron: config.recurring_cron.clone(),
            marketing_cron: config.marketing_cron.clone(),
        })
    }

    pub async fn start(&self) -> JobResult<()> {
        info!(
            recurring = %self.recurring_cron,
            marketing = %self.marketing_cron,
            "starting job scheduler"
        );

        self.inner
            .add(recurring_job(&self.recurring_cron, self.ctx.clone())?)
            .await?;
        self.inner
            .add(marketing_job(&self.marketing_cron, self.ctx.clone())?)
            .await?;
        self.inner.start().await?;

        Ok(())
    }

    /// Start the jobs and block until Ctrl-C, then shut the scheduler down.
    pub async fn run_until_shutdown(mut self) -> JobResult<()> {
        self.start().await?;
        tokio::signal::ctrl_c().await?;

        info!("shutting down job scheduler");
        self.inner.shutdown().await?;
        Ok(())
    }
}

pub fn recurring_job(cron: &str, ctx: JobContext) -> JobResult<Job> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let ctx = ctx.clone();
        Box::pin(async move {
            info!("running recurring invoice job");
            match RecurringInvoiceJob::new(ctx).run(Utc::now()).await {
                Ok(report) => report.log("recurring invoices"),
                Err(e) => error!(error = %e, "recurring invoice job failed"),
            }
        })
    })?;
    Ok(job)
}

pub fn marketing_job(cron: &str, ctx: JobContext) -> JobResult<Job> {
    let job = Job::new_async(cron, move |_uuid, _lock| {
        let ctx = ctx.clone();
        Box::pin(async move {
            info!("running marketing job");
            match MarketingJob::new(ctx).run(Utc::now()).await {
                Ok(report) => report.log("marketing"),
                Err(e) => error!(error = %e, "marketing job failed"),
            }
        })
    })?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobError;
    use crate::jobs::testing::harness;

    #[test]
    fn default_schedules_parse() {
        let h = harness();
        assert!(recurring_job("0 */15 * * * *", h.ctx.clone()).is_ok());
        assert!(marketing_job("0 0 9 * * *", h.ctx.clone()).is_ok());
    }

    #[test]
    fn bad_cron_is_rejected() {
        let h = harness();
        assert!(matches!(
            recurring_job("every fifteen minutes", h.ctx.clone()),
            Err(JobError::Scheduler(_))
        ));
    }
}
