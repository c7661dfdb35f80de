use crate::domain::model::BatchJob;
use crate::domain::ports::JobStatusSource;
use crate::utils::error::{CloudError, Result};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// How long and how often to poll a batch job.
///
/// With neither `timeout` nor `cancel` set, waiting only ends once the job
/// reaches a terminal state.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub poll_interval: Duration,
    pub timeout: Option<Duration>,
    pub cancel: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
            cancel: None,
        }
    }
}

impl PollOptions {
    pub fn every(poll_interval: Duration) -> Self {
        Self {
            poll_interval,
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// 輪詢直到 job 進入終止狀態，回傳最後一次取得的 job。
///
/// 至少會查詢一次狀態；PENDING / QUEUED / RUNNING 以外的狀態都視為終止。
/// 逾時回傳 `CloudError::Timeout`，取消回傳 `CloudError::Cancelled`。
pub async fn wait_for_job<J>(source: &J, job_name: &str, options: &PollOptions) -> Result<BatchJob>
where
    J: JobStatusSource + ?Sized,
{
    let started = Instant::now();
    // 期限超出 Instant 可表示的範圍時視為沒有期限
    let deadline = options.timeout.and_then(|timeout| started.checked_add(timeout));
    let cancelled = || CloudError::Cancelled {
        job_name: job_name.to_string(),
    };
    let timed_out = || CloudError::Timeout {
        job_name: job_name.to_string(),
        waited: started.elapsed(),
    };

    loop {
        if options.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
            return Err(cancelled());
        }

        let job = source.get_job_status(job_name).await?;
        tracing::debug!("Batch job {} is {:?}", job_name, job.state);

        if !job.state.is_active() {
            if job.state.is_success() {
                tracing::info!(
                    "✅ Batch job {} succeeded, output: {}",
                    job_name,
                    job.output_uri.as_deref().unwrap_or("<none>")
                );
            } else {
                match &job.error {
                    Some(error) => {
                        tracing::warn!("❌ Batch job {} ended as {:?}: {}", job_name, job.state, error)
                    }
                    None => tracing::warn!("❌ Batch job {} ended as {:?}", job_name, job.state),
                }
            }
            return Ok(job);
        }

        // 最後一次查詢落在期限上，之後才算逾時
        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(timed_out());
                }
                options.poll_interval.min(deadline - now)
            }
            None => options.poll_interval,
        };

        if pause.is_zero() {
            continue;
        }

        match &options.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => return Err(cancelled()),
                    _ = tokio::time::sleep(pause) => {}
                }
            }
            None => tokio::time::sleep(pause).await,
        }
    }
}

/// `true` exactly when the job finished as SUCCEEDED.
pub async fn await_job<J>(source: &J, job_name: &str, options: &PollOptions) -> Result<bool>
where
    J: JobStatusSource + ?Sized,
{
    Ok(wait_for_job(source, job_name, options).await?.state.is_success())
}
