//! One ingestion run: fetch and extract every target, stamp the results
//! with the run date, merge them into the store in a single batch.

use chrono::NaiveDate;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::{ChannelListConfig, SourcesConfig};
use crate::entities::ListingRecord;
use crate::fetcher::HttpFetcher;
use crate::scheduler::{Scheduler, SchedulerConfig, TargetOutcome, TargetReport, UniformDelay};
use crate::store::{MergeReport, RecordStore, StoreError};

#[derive(Debug)]
pub struct RunSummary {
    pub date: NaiveDate,
    pub targets: Vec<TargetReport>,
    /// Records handed to the store, in target order.
    pub records: Vec<ListingRecord>,
    pub merge: MergeReport,
    /// The run was interrupted before every target finished; nothing was merged.
    pub cancelled: bool,
}

impl RunSummary {
    pub fn failed_targets(&self) -> impl Iterator<Item = &TargetReport> {
        self.targets
            .iter()
            .filter(|r| matches!(r.outcome, TargetOutcome::Failed(_)))
    }

    pub fn extracted_records(&self) -> usize {
        self.records.len()
    }
}

pub struct Pipeline {
    scheduler: Scheduler,
    store: RecordStore,
}

impl Pipeline {
    pub fn new(scheduler: Scheduler, store: RecordStore) -> Self {
        Self { scheduler, store }
    }

    /// Production wiring: HTTP fetcher and uniform random pacing from `sources`.
    pub fn from_sources(
        sources: &SourcesConfig,
        store: RecordStore,
        shutdown_token: CancellationToken,
    ) -> Result<Self, reqwest::Error> {
        let fetcher = HttpFetcher::new(&sources.policy)?;
        let scheduler = Scheduler::new(
            Arc::new(fetcher),
            Arc::new(UniformDelay::new(sources.delay)),
            SchedulerConfig {
                max_rank: sources.max_rank,
                max_retries: sources.max_retries,
            },
        )
        .with_shutdown_token(shutdown_token);

        Ok(Self::new(scheduler, store))
    }

    /// Per-target failures are reported in the summary; only a store failure
    /// fails the run.
    #[instrument(skip_all, fields(date = %date, targets = targets.len()))]
    pub async fn run(
        &self,
        targets: &[ChannelListConfig],
        date: NaiveDate,
    ) -> Result<RunSummary, StoreError> {
        let reports = self.scheduler.run(targets).await;
        let records = stamp(date, &reports);

        let cancelled = reports
            .iter()
            .any(|r| matches!(r.outcome, TargetOutcome::Cancelled));
        let merge = if cancelled {
            warn!(
                "Run cancelled; discarding {} extracted records, store left as is",
                records.len()
            );
            MergeReport::default()
        } else if records.is_empty() {
            info!("No rows parsed. Check selectors/URLs.");
            MergeReport::default()
        } else {
            self.store.merge_async(records.clone()).await?
        };

        let summary = RunSummary {
            date,
            targets: reports,
            records,
            merge,
            cancelled,
        };
        info!(
            "Run finished: {} targets, {} failed, {} records extracted, {} inserted",
            summary.targets.len(),
            summary.failed_targets().count(),
            summary.extracted_records(),
            summary.merge.inserted
        );
        Ok(summary)
    }
}

/// Attach the run date, channel and list to every extracted item.
pub fn stamp(date: NaiveDate, reports: &[TargetReport]) -> Vec<ListingRecord> {
    reports
        .iter()
        .flat_map(|report| {
            report.outcome.items().iter().map(|item| {
                ListingRecord::from_raw(
                    date,
                    report.target.channel,
                    &report.target.list_name,
                    item.clone(),
                )
            })
        })
        .collect()
}
