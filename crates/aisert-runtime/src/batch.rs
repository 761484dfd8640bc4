//! Concurrent validation of many responses against one plan.
//!
//! Each response gets its own [`Aisert`] session on tokio's blocking pool.
//! Sessions share the registry, so every model backend is created once per
//! process no matter how many sessions ask for it first.

use aisert_core::{Aisert, AisertConfig, AisertReport, BackendRegistry, CancellationFlag, Content, Plan};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::RuntimeError;

/// Sessions in flight when no concurrency is given.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Runs a [`Plan`] over a batch of contents.
#[derive(Debug, Clone)]
pub struct BatchRunner {
    registry: Arc<BackendRegistry>,
    config: AisertConfig,
    concurrency: usize,
    deadline: Option<Duration>,
    cancellation: CancellationFlag,
}

impl BatchRunner {
    /// # Arguments
    /// * `registry` - Backends shared by every session
    /// * `config` - Configuration applied to every session
    /// * `concurrency` - Maximum sessions in flight (0 is treated as 1)
    pub fn new(registry: Arc<BackendRegistry>, config: AisertConfig, concurrency: usize) -> Self {
        Self {
            registry,
            config,
            concurrency: concurrency.max(1),
            deadline: None,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Bound the model-backed calls of each session by `timeout`.
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        self.deadline = Some(timeout);
        self
    }

    /// Flag shared by every session; cancelling it interrupts model-backed
    /// validations that have not finished yet.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Validate every content against `plan`.
    ///
    /// Reports come back in input order.
    pub async fn run(
        &self,
        contents: Vec<Content>,
        plan: &Plan,
    ) -> Result<Vec<AisertReport>, RuntimeError> {
        let started = Instant::now();
        let total = contents.len();
        let plan = Arc::new(plan.clone());

        let reports: Vec<AisertReport> = stream::iter(contents.into_iter().enumerate())
            .map(|(index, content)| self.spawn_session(index, content, Arc::clone(&plan)))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let failed = reports.iter().filter(|r| !r.passed()).count();
        tracing::info!(
            total = total,
            failed = failed,
            concurrency = self.concurrency,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "batch validation finished"
        );

        Ok(reports)
    }

    async fn spawn_session(
        &self,
        index: usize,
        content: Content,
        plan: Arc<Plan>,
    ) -> Result<AisertReport, RuntimeError> {
        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        let deadline = self.deadline;
        let cancellation = self.cancellation.clone();

        tokio::task::spawn_blocking(move || {
            let mut aisert = Aisert::with_config(content, config)
                .with_backends(registry)
                .with_cancellation(cancellation);
            if let Some(timeout) = deadline {
                aisert = aisert.with_deadline(timeout);
            }

            let report = plan.evaluate(&mut aisert);
            tracing::debug!(index = index, status = report.passed(), "session finished");
            report
        })
        .await
        .map_err(|e| RuntimeError::Join { index, source: e })
    }
}
