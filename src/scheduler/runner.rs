use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::ChannelListConfig;
use crate::entities::RawItem;
use crate::extractor::extract_page;
use crate::fetcher::{FetchError, PageFetcher};
use crate::scheduler::DelayPolicy;

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub max_rank: u32,
    /// Extra attempts for transient fetch errors; 0 means one attempt only.
    pub max_retries: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_rank: crate::config::sources::DEFAULT_MAX_RANK,
            max_retries: 0,
        }
    }
}

/// What happened to one target in a run.
#[derive(Debug)]
pub enum TargetOutcome {
    Extracted(Vec<RawItem>),
    /// The page was fetched but no entries could be read from it.
    Empty,
    Failed(FetchError),
    Cancelled,
}

impl TargetOutcome {
    pub fn items(&self) -> &[RawItem] {
        match self {
            Self::Extracted(items) => items,
            _ => &[],
        }
    }
}

#[derive(Debug)]
pub struct TargetReport {
    pub target: ChannelListConfig,
    pub outcome: TargetOutcome,
    pub attempts: u32,
}

/// Runs targets one at a time, pausing between them, so a host never sees
/// more than one request in flight from a run.
pub struct Scheduler {
    fetcher: Arc<dyn PageFetcher>,
    delay: Arc<dyn DelayPolicy>,
    config: SchedulerConfig,
    shutdown_token: CancellationToken,
}

impl Scheduler {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        delay: Arc<dyn DelayPolicy>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            fetcher,
            delay,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Use an externally owned token, e.g. one cancelled on Ctrl-C.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    /// Process `targets` in order. A failing target never stops the ones after
    /// it; once the run is cancelled the remaining targets are reported as
    /// `Cancelled` without being started.
    pub async fn run(&self, targets: &[ChannelListConfig]) -> Vec<TargetReport> {
        info!(
            "Scheduling {} targets (max_rank: {}, max_retries: {})",
            targets.len(),
            self.config.max_rank,
            self.config.max_retries
        );

        let mut reports = Vec::with_capacity(targets.len());
        for target in targets {
            if self.shutdown_token.is_cancelled() {
                reports.push(TargetReport {
                    target: target.clone(),
                    outcome: TargetOutcome::Cancelled,
                    attempts: 0,
                });
                continue;
            }

            let span = info_span!("target", channel = %target.channel, list = %target.list_name);
            let report = self.process_target(target).instrument(span).await;
            reports.push(report);

            // Pacing applies after failures too
            let pause = self.delay.between_targets();
            if !self.pause(pause).await {
                info!("Run cancelled during inter-target delay");
            }
        }

        reports
    }

    async fn process_target(&self, target: &ChannelListConfig) -> TargetReport {
        info!("Fetching {}:{} -> {}", target.channel, target.list_name, target.url);

        let mut attempts = 0;
        let outcome = loop {
            attempts += 1;

            let result = tokio::select! {
                _ = self.shutdown_token.cancelled() => break TargetOutcome::Cancelled,
                result = self.fetcher.fetch(&target.url) => result,
            };

            match result {
                Ok(page) => {
                    let items = extract_page(target.channel, &page, self.config.max_rank);
                    if items.is_empty() {
                        warn!(
                            "No entries extracted from {}:{}; check selectors",
                            target.channel, target.list_name
                        );
                        break TargetOutcome::Empty;
                    }
                    info!("Extracted {} entries", items.len());
                    break TargetOutcome::Extracted(items);
                }
                Err(e) if e.should_retry() && attempts <= self.config.max_retries => {
                    let wait = self.delay.before_retry(attempts);
                    warn!(
                        "Fetch failed (attempt {}/{}): {}; retrying in {:?}",
                        attempts,
                        self.config.max_retries + 1,
                        e,
                        wait
                    );
                    if !self.pause(wait).await {
                        break TargetOutcome::Cancelled;
                    }
                }
                Err(e) => {
                    error!(
                        "Error fetching {}:{} -> {}",
                        target.channel, target.list_name, e
                    );
                    break TargetOutcome::Failed(e);
                }
            }
        };

        TargetReport {
            target: target.clone(),
            outcome,
            attempts,
        }
    }

    /// Sleep unless cancelled first. Returns false when the run was cancelled.
    async fn pause(&self, duration: Duration) -> bool {
        if duration.is_zero() {
            return !self.shutdown_token.is_cancelled();
        }
        debug!("Pausing for {:?}", duration);
        tokio::select! {
            _ = self.shutdown_token.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}
