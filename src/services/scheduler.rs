// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fetch scheduler: the ingestion cycle.
//!
//! Each cycle walks every configured city:
//! 1. Fetch the feed from the provider (retrying transient failures)
//! 2. Normalize the payload into a reading
//! 3. Append the reading to the store
//! 4. Record a per-city outcome, success or not
//!
//! A failure for one city never stops the others. Cycles are triggered on a
//! fixed interval and never overlap: a trigger that fires while a cycle is
//! still running is dropped.

use crate::config::Config;
use crate::db::ReadingStore;
use crate::models::{City, CycleReport, FailureCause, FetchOutcome};
use crate::services::normalizer::Normalizer;
use crate::services::provider::{AqiProvider, ProviderError};
use crate::services::retry::RetryPolicy;
use chrono::Utc;
use futures_util::{stream, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Whether a cycle is currently in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    Idle,
    Running,
}

/// Shared view of the scheduler: the in-progress flag and the last report.
///
/// Held by both the scheduler and the HTTP layer.
#[derive(Debug, Default)]
pub struct CycleMonitor {
    running: AtomicBool,
    last_report: RwLock<Option<CycleReport>>,
}

/// Marks a cycle as running until dropped.
#[derive(Debug)]
pub struct CycleGuard {
    monitor: Arc<CycleMonitor>,
}

impl Drop for CycleGuard {
    fn drop(&mut self) {
        self.monitor.running.store(false, Ordering::Release);
    }
}

impl CycleMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claim the running flag, or `None` if a cycle already holds it.
    pub fn try_begin(self: &Arc<Self>) -> Option<CycleGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| CycleGuard {
                monitor: Arc::clone(self),
            })
    }

    pub fn state(&self) -> CycleState {
        if self.running.load(Ordering::Acquire) {
            CycleState::Running
        } else {
            CycleState::Idle
        }
    }

    pub async fn last_report(&self) -> Option<CycleReport> {
        self.last_report.read().await.clone()
    }

    async fn record(&self, report: CycleReport) {
        *self.last_report.write().await = Some(report);
    }
}

/// Drives ingestion cycles against an [`AqiProvider`].
pub struct FetchScheduler<P> {
    provider: P,
    normalizer: Normalizer,
    store: Arc<ReadingStore>,
    monitor: Arc<CycleMonitor>,
    cities: Vec<City>,
    retry: RetryPolicy,
    interval: Duration,
    concurrency: usize,
}

impl<P: AqiProvider> FetchScheduler<P> {
    pub fn new(
        provider: P,
        store: Arc<ReadingStore>,
        monitor: Arc<CycleMonitor>,
        config: &Config,
    ) -> Self {
        Self {
            provider,
            normalizer: Normalizer::new(config.retain_raw_payload),
            store,
            monitor,
            cities: config.cities.clone(),
            retry: RetryPolicy::from_config(config),
            interval: config.poll_interval,
            concurrency: config.fetch_concurrency.max(1),
        }
    }

    pub fn monitor(&self) -> &Arc<CycleMonitor> {
        &self.monitor
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Run one cycle now, unless one is already running (`None`).
    pub async fn try_run_cycle(&self) -> Option<CycleReport> {
        let _guard = self.monitor.try_begin()?;
        Some(self.execute_cycle().await)
    }

    async fn execute_cycle(&self) -> CycleReport {
        let started_at = Utc::now();
        tracing::info!(cities = self.cities.len(), "Fetch cycle started");

        let outcomes: Vec<FetchOutcome> = stream::iter(self.cities.clone())
            .map(|city| async move { self.process_city(city).await })
            .buffered(self.concurrency)
            .collect()
            .await;

        let report = CycleReport::new(started_at, Utc::now(), outcomes);
        log_report(&report);
        self.monitor.record(report.clone()).await;
        report
    }

    /// Fetch, normalize and store one city. Never fails; failures become
    /// the outcome.
    async fn process_city(&self, city: City) -> FetchOutcome {
        let mut attempts = 0;
        let payload = loop {
            attempts += 1;
            match self.provider.fetch(&city).await {
                Ok(payload) => break payload,
                Err(e) if e.cause().is_retryable() && self.retry.should_retry(attempts) => {
                    let retry_after = match &e {
                        ProviderError::RateLimited { retry_after } => *retry_after,
                        _ => None,
                    };
                    let delay = self.retry.next_delay(attempts, retry_after);
                    tracing::debug!(
                        city = %city,
                        attempt = attempts,
                        cause = %e.cause(),
                        delay_ms = delay.as_millis() as u64,
                        "Transient provider failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    return FetchOutcome::failure(city, e.cause(), e.to_string(), attempts);
                }
            }
        };

        let reading = match self.normalizer.normalize(&city, &payload) {
            Ok(reading) => reading,
            Err(e) => {
                return FetchOutcome::failure(
                    city,
                    FailureCause::InvalidData,
                    e.to_string(),
                    attempts,
                );
            }
        };

        if let Err(e) = self.store.append(reading).await {
            return FetchOutcome::failure(
                city,
                FailureCause::StoreError,
                e.to_string(),
                attempts,
            );
        }

        FetchOutcome::success(city, attempts)
    }
}

impl<P: AqiProvider + 'static> FetchScheduler<P> {
    /// Trigger a cycle every interval until `shutdown` resolves.
    ///
    /// The first cycle starts immediately. On shutdown an in-flight cycle is
    /// aborted; readings it already appended stay, the rest are dropped.
    pub async fn run(self: Arc<Self>, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut in_flight: Option<JoinHandle<()>> = None;
        tokio::pin!(shutdown);

        tracing::info!(
            interval_secs = self.interval.as_secs(),
            cities = self.cities.len(),
            "Fetch scheduler started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    if let Some(handle) = in_flight.take() {
                        handle.abort();
                    }
                    tracing::info!("Fetch scheduler stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let Some(guard) = self.monitor.try_begin() else {
                        tracing::warn!("Previous fetch cycle still running, skipping trigger");
                        continue;
                    };
                    let scheduler = Arc::clone(&self);
                    in_flight = Some(tokio::spawn(async move {
                        let _guard = guard;
                        scheduler.execute_cycle().await;
                    }));
                }
            }
        }
    }
}

fn log_report(report: &CycleReport) {
    for outcome in &report.outcomes {
        match outcome.cause {
            None => tracing::info!(
                city = %outcome.city,
                attempts = outcome.attempts,
                "City fetch succeeded"
            ),
            Some(cause) => tracing::warn!(
                city = %outcome.city,
                cause = %cause,
                attempts = outcome.attempts,
                detail = outcome.error_detail.as_deref().unwrap_or(""),
                "City fetch failed"
            ),
        }
    }

    tracing::info!(
        status = ?report.status,
        total = report.outcomes.len(),
        failed = report.failed_count(),
        duration_ms = (report.finished_at - report.started_at).num_milliseconds(),
        "Fetch cycle finished"
    );
}
