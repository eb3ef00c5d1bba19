/*
 *  Copyright 2026 Opifex Contributors
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Queue polling and attribution.
//!
//! One poller runs per deployment binding. Each tick it checks its slot
//! ceiling, scans its queue for eligible instances in priority order and
//! races the rest of the cluster for each candidate through the atomic
//! claim. Won candidates are handed to a [`Loader`] on a fresh task; lost
//! candidates are simply dropped, another node is already running them.
//!
//! A failed poll never stops the poller. Database errors back off
//! exponentially with jitter and the loop resumes as soon as a poll
//! succeeds again.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Semaphore};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::context::ContextCache;
use super::loader::Loader;
use super::types::{ClaimedInstance, ExecutionSlot};
use crate::dal::{ClaimOutcome, DAL};
use crate::engine::EngineConfig;
use crate::error::DataAccessError;
use crate::models::{DeploymentParameter, Node, Queue};

/// Polls one queue on behalf of one node.
pub struct Poller {
    dal: DAL,
    cache: Arc<ContextCache>,
    node: Arc<Node>,
    queue: Queue,
    binding: DeploymentParameter,
    config: Arc<EngineConfig>,
    semaphore: Arc<Semaphore>,
}

impl Poller {
    /// Creates a poller for one deployment binding. The binding's
    /// `max_concurrent` sizes the execution slot pool; zero permits keep
    /// the poller idle, which is how a binding is paused.
    pub fn new(
        dal: DAL,
        cache: Arc<ContextCache>,
        node: Arc<Node>,
        queue: Queue,
        binding: DeploymentParameter,
        config: Arc<EngineConfig>,
    ) -> Self {
        let permits = usize::try_from(binding.max_concurrent).unwrap_or(0);
        Self {
            dal,
            cache,
            node,
            queue,
            binding,
            config,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Runs the poll loop until shutdown is signalled, then waits for
    /// in-flight instances to finish before returning.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            node = %self.node.name,
            queue = %self.queue.name,
            max_concurrent = self.binding.max_concurrent,
            polling_interval_ms = self.binding.polling_interval_ms,
            "Starting queue poller"
        );

        tokio::select! {
            _ = self.poll_loop() => {}
            _ = shutdown.recv() => {
                info!(
                    node = %self.node.name,
                    queue = %self.queue.name,
                    "Queue poller shutdown requested"
                );
            }
        }

        // Slots only come back when their loaders finish, so this resolves
        // once every instance this poller attributed has reached a
        // terminal state.
        let in_flight = u32::try_from(self.binding.max_concurrent).unwrap_or(0);
        let _ = self.semaphore.acquire_many(in_flight).await;
        info!(
            node = %self.node.name,
            queue = %self.queue.name,
            "Queue poller stopped"
        );
    }

    async fn poll_loop(&self) {
        let interval_ms = u64::try_from(self.binding.polling_interval_ms).unwrap_or(1_000);
        let mut interval = time::interval(Duration::from_millis(interval_ms.max(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut failures = 0u32;

        loop {
            interval.tick().await;
            match self.poll_once().await {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    let delay = self.backoff_delay(failures);
                    warn!(
                        queue = %self.queue.name,
                        error = %e,
                        failures,
                        delay_ms = delay.as_millis() as u64,
                        "Queue poll failed, backing off"
                    );
                    time::sleep(delay).await;
                }
            }
        }
    }

    /// One poll: ceiling check, eligibility scan, then a claim race per
    /// candidate.
    async fn poll_once(&self) -> Result<(), DataAccessError> {
        if self.semaphore.available_permits() == 0 {
            debug!(queue = %self.queue.name, "All execution slots busy, skipping poll");
            return Ok(());
        }

        let candidates = self
            .dal
            .job_instance()
            .scan_eligible(self.queue.id, self.config.scan_batch_size)
            .await?;
        if candidates.is_empty() {
            return Ok(());
        }
        debug!(
            queue = %self.queue.name,
            candidates = candidates.len(),
            "Found eligible instances"
        );

        for (instance, job_def) in candidates {
            let permit = match self.semaphore.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    debug!(queue = %self.queue.name, "Execution slots exhausted mid-batch");
                    break;
                }
            };

            // Cheap pre-check; the claim transaction re-checks under lock.
            if job_def.highlander
                && self
                    .dal
                    .job_instance()
                    .count_active_for_job_def(job_def.id)
                    .await?
                    > 0
            {
                debug!(
                    instance = instance.id,
                    application = %job_def.application_name,
                    "Highlander instance already active, leaving in queue"
                );
                drop(permit);
                continue;
            }

            match self
                .dal
                .attribution()
                .claim(instance.id, job_def.id, job_def.highlander, self.node.id)
                .await?
            {
                ClaimOutcome::Won => {
                    info!(
                        instance = instance.id,
                        queue = %self.queue.name,
                        application = %job_def.application_name,
                        "Attributed instance to this node"
                    );
                    let slot = ExecutionSlot::new(self.queue.name.clone(), permit);
                    let loader = Loader::new(
                        self.dal.clone(),
                        self.cache.clone(),
                        self.node.clone(),
                        self.config.clone(),
                        ClaimedInstance { instance, job_def },
                        slot,
                    );
                    tokio::spawn(loader.run());
                }
                ClaimOutcome::Lost => {
                    debug!(
                        instance = instance.id,
                        "Instance was claimed elsewhere before this node"
                    );
                }
                ClaimOutcome::HighlanderBlocked => {
                    debug!(
                        instance = instance.id,
                        application = %job_def.application_name,
                        "Highlander instance already active, leaving in queue"
                    );
                }
            }
        }

        Ok(())
    }

    fn backoff_delay(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(10);
        let base = self.config.poll_backoff_base.saturating_mul(1u32 << exponent);
        let capped = base.min(self.config.poll_backoff_max);
        // Spread retries out so pollers that failed together do not retry
        // together.
        capped.mul_f64(0.5 + rand::random::<f64>() * 0.5)
    }
}
