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

//! Per-instance execution.
//!
//! A loader owns exactly one claimed instance from `running` to its
//! terminal state. It never returns an error to its caller: resolution
//! failures, load failures, payload failures and nonzero return codes all
//! become a `crashed` (or `killed`) outcome on the instance itself, and a
//! failed status write is retried, then logged and abandoned rather than
//! propagated. The execution slot travels with the loader and releases its
//! pool permit when the loader finishes, on every path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::context::{ContextCache, ExecutionContext};
use super::output_pump::OutputPump;
use super::payload;
use super::types::{
    ClaimedInstance, DeliverableDescriptor, ExecutionSlot, PayloadReport, PayloadRequest,
};
use crate::dal::DAL;
use crate::engine::EngineConfig;
use crate::error::{DataAccessError, ExecutionError};
use crate::models::{Deliverable, JobState, NewDeliverable, NewMessage, Node, PayloadKind};

/// Executes one claimed job instance end-to-end.
pub struct Loader {
    dal: DAL,
    cache: Arc<ContextCache>,
    node: Arc<Node>,
    config: Arc<EngineConfig>,
    claimed: ClaimedInstance,
    slot: ExecutionSlot,
}

/// How a payload run came out, before bookkeeping.
enum RunOutcome {
    /// The payload ran to completion and returned a code. The scratch
    /// directory is carried along so reported files survive until they
    /// are registered.
    Completed {
        return_code: i32,
        report: PayloadReport,
        scratch: Option<TempDir>,
    },
    /// The child process was terminated on an operator's kill request.
    Killed,
}

impl Loader {
    /// Creates a loader for one claimed instance. The slot is released
    /// when the loader finishes.
    pub fn new(
        dal: DAL,
        cache: Arc<ContextCache>,
        node: Arc<Node>,
        config: Arc<EngineConfig>,
        claimed: ClaimedInstance,
        slot: ExecutionSlot,
    ) -> Self {
        Self {
            dal,
            cache,
            node,
            config,
            claimed,
            slot,
        }
    }

    /// Runs the instance to a terminal state.
    pub async fn run(self) {
        let instance_id = self.claimed.instance.id;
        info!(
            instance = instance_id,
            application = %self.claimed.job_def.application_name,
            "Starting job instance"
        );

        if !self.mark_running().await {
            return;
        }

        match self.execute().await {
            Ok(RunOutcome::Completed {
                return_code: 0,
                report,
                scratch,
            }) => {
                info!(instance = instance_id, "Job instance ended normally");
                self.append_notes(&report.notes).await;
                if self.write_terminal(JobState::Ended, Some(0)).await {
                    self.register_deliverables(
                        &report.deliverables,
                        scratch.as_ref().map(TempDir::path),
                    )
                    .await;
                }
            }
            Ok(RunOutcome::Completed {
                return_code,
                report,
                scratch: _scratch,
            }) => {
                warn!(
                    instance = instance_id,
                    return_code, "Job instance completed with nonzero return code"
                );
                self.append_notes(&report.notes).await;
                self.write_terminal(JobState::Crashed, Some(return_code))
                    .await;
            }
            Ok(RunOutcome::Killed) => {
                warn!(
                    instance = instance_id,
                    "Job instance killed on operator request"
                );
                self.write_terminal(JobState::Killed, None).await;
            }
            Err(e) => {
                error!(instance = instance_id, error = %e, "Job instance crashed");
                self.append_note(format!("Execution failed: {}", e)).await;
                self.write_terminal(JobState::Crashed, None).await;
            }
        }

        drop(self.slot);
    }

    async fn execute(&self) -> Result<RunOutcome, ExecutionError> {
        let job_def = &self.claimed.job_def;
        let kind = job_def.kind().ok_or_else(|| {
            ExecutionError::Invocation(format!("Unknown payload kind '{}'", job_def.payload_kind))
        })?;

        let context = self.cache.get_or_build(job_def).await?;
        let request = PayloadRequest {
            job_instance_id: self.claimed.instance.id,
            application_name: job_def.application_name.clone(),
            parameters: self.claimed.instance.effective_parameters(job_def),
        };

        match kind {
            PayloadKind::Library => self.run_library(context, request).await,
            PayloadKind::Subprocess => self.run_subprocess(&context, request).await,
        }
    }

    /// Invokes an in-process library payload on a blocking thread.
    ///
    /// Kill requests are cooperative for this payload kind: the flag stays
    /// readable through the client, but a payload that ignores it runs to
    /// completion.
    async fn run_library(
        &self,
        context: Arc<ExecutionContext>,
        request: PayloadRequest,
    ) -> Result<RunOutcome, ExecutionError> {
        let entry_point = self.claimed.job_def.entry_point.clone();
        let payload_path = self.claimed.job_def.payload_path.clone();

        let (return_code, report) = tokio::task::spawn_blocking(move || {
            let library = context.library().ok_or_else(|| ExecutionError::LibraryLoad {
                path: PathBuf::from(payload_path),
                reason: "Execution context holds no loaded library".to_string(),
            })?;
            payload::invoke_library(library, &entry_point, &request)
        })
        .await
        .map_err(|e| ExecutionError::Invocation(format!("Payload thread panicked: {}", e)))??;

        Ok(RunOutcome::Completed {
            return_code,
            report,
            scratch: None,
        })
    }

    /// Spawns a subprocess payload, drains its output and supervises it
    /// until exit, watching the kill flag along the way.
    async fn run_subprocess(
        &self,
        context: &ExecutionContext,
        request: PayloadRequest,
    ) -> Result<RunOutcome, ExecutionError> {
        let instance_id = self.claimed.instance.id;
        let job_def = &self.claimed.job_def;

        tokio::fs::create_dir_all(&self.node.tmp_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("job-{:010}-", instance_id))
            .tempdir_in(&self.node.tmp_root)?;

        let mut command =
            payload::build_command(job_def, &request, scratch.path(), context.artifacts());
        let mut child = command.spawn().map_err(|e| ExecutionError::Spawn {
            path: PathBuf::from(&job_def.payload_path),
            source: e,
        })?;
        let pump = OutputPump::start(
            instance_id,
            &mut child,
            Path::new(&self.node.log_root),
            self.config.echo_job_output,
        )
        .await?;

        let progress_file = payload::progress_file_path(scratch.path());
        let mut kill_poll = time::interval(self.config.kill_poll_interval);
        kill_poll.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        let mut killed = false;
        let mut last_progress = None;

        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                _ = kill_poll.tick() => {
                    self.push_progress(&progress_file, &mut last_progress).await;
                    if !killed && self.kill_flag().await {
                        warn!(instance = instance_id, "Kill requested, terminating child process");
                        if let Err(e) = child.start_kill() {
                            warn!(instance = instance_id, error = %e, "Failed to signal child process");
                        }
                        killed = true;
                    }
                }
            }
        };

        let (stdout_lines, stderr_lines) = pump.join().await?;
        debug!(
            instance = instance_id,
            stdout_lines, stderr_lines, "Output streams drained"
        );

        if killed {
            return Ok(RunOutcome::Killed);
        }

        match status.code() {
            Some(0) => {
                let deliverables =
                    payload::read_report_file(&payload::report_file_path(scratch.path())).await;
                Ok(RunOutcome::Completed {
                    return_code: 0,
                    report: PayloadReport {
                        return_code: 0,
                        deliverables,
                        notes: Vec::new(),
                    },
                    scratch: Some(scratch),
                })
            }
            Some(code) => Ok(RunOutcome::Completed {
                return_code: code,
                report: PayloadReport::default(),
                scratch: Some(scratch),
            }),
            None => Err(ExecutionError::Invocation(
                "Child process terminated by signal".to_string(),
            )),
        }
    }

    /// Forwards the payload's self-reported progress to the instance row.
    /// Best effort on both sides, a failed read or write just waits for
    /// the next poll.
    async fn push_progress(&self, progress_file: &Path, last: &mut Option<i32>) {
        let Some(progress) = payload::read_progress_file(progress_file).await else {
            return;
        };
        if *last == Some(progress) {
            return;
        }
        match self
            .dal
            .job_instance()
            .set_progress(self.claimed.instance.id, progress)
            .await
        {
            Ok(_) => *last = Some(progress),
            Err(e) => debug!(
                instance = self.claimed.instance.id,
                error = %e,
                "Progress write failed"
            ),
        }
    }

    async fn kill_flag(&self) -> bool {
        match self
            .dal
            .job_instance()
            .kill_requested(self.claimed.instance.id)
            .await
        {
            Ok(flag) => flag,
            Err(e) => {
                debug!(
                    instance = self.claimed.instance.id,
                    error = %e,
                    "Kill flag poll failed"
                );
                false
            }
        }
    }

    /// Moves the instance to `running`, retrying transient write failures.
    /// Returns false when the run must be abandoned.
    async fn mark_running(&self) -> bool {
        let instance_id = self.claimed.instance.id;
        let mut attempt = 0u32;
        loop {
            match self.dal.job_instance().mark_running(instance_id).await {
                Ok(true) => return true,
                Ok(false) => {
                    warn!(
                        instance = instance_id,
                        "Instance is no longer attributed, abandoning run"
                    );
                    return false;
                }
                Err(e) if attempt < self.config.status_write_retries => {
                    attempt += 1;
                    warn!(
                        instance = instance_id,
                        error = %e,
                        attempt,
                        "Status write failed, retrying"
                    );
                    time::sleep(self.backoff(attempt)).await;
                }
                Err(e) => {
                    error!(
                        instance = instance_id,
                        error = %e,
                        "Giving up marking instance running; row left for operational repair"
                    );
                    return false;
                }
            }
        }
    }

    /// Writes the terminal record, retrying transient failures. Returns
    /// true when this loader's write landed.
    async fn write_terminal(&self, state: JobState, return_code: Option<i32>) -> bool {
        let instance_id = self.claimed.instance.id;
        let mut attempt = 0u32;
        loop {
            match self
                .dal
                .history()
                .create_for_run(instance_id, state, return_code)
                .await
            {
                Ok(_) => {
                    info!(instance = instance_id, state = %state, "Job instance finished");
                    return true;
                }
                Err(DataAccessError::Conflict(_)) => {
                    warn!(
                        instance = instance_id,
                        "Instance was already finished by another writer"
                    );
                    return false;
                }
                Err(e) if attempt < self.config.status_write_retries => {
                    attempt += 1;
                    warn!(
                        instance = instance_id,
                        error = %e,
                        attempt,
                        "Terminal status write failed, retrying"
                    );
                    time::sleep(self.backoff(attempt)).await;
                }
                Err(e) => {
                    error!(
                        instance = instance_id,
                        error = %e,
                        "Giving up on terminal status write; row left for operational repair"
                    );
                    return false;
                }
            }
        }
    }

    async fn append_notes(&self, notes: &[String]) {
        for note in notes {
            self.append_note(note.clone()).await;
        }
    }

    async fn append_note(&self, text: String) {
        let message = NewMessage {
            job_instance_id: self.claimed.instance.id,
            text_message: text,
            created_at: chrono::Utc::now().naive_utc(),
        };
        if let Err(e) = self.dal.message().append(message).await {
            warn!(
                instance = self.claimed.instance.id,
                error = %e,
                "Failed to append note"
            );
        }
    }

    /// Registers everything the payload reported. Each failure is logged
    /// and skipped; the instance's outcome is already settled.
    async fn register_deliverables(
        &self,
        descriptors: &[DeliverableDescriptor],
        scratch: Option<&Path>,
    ) {
        for descriptor in descriptors {
            match self.register_deliverable(descriptor, scratch).await {
                Ok(deliverable) => info!(
                    instance = self.claimed.instance.id,
                    name = %deliverable.original_name,
                    random_id = %deliverable.random_id,
                    "Registered deliverable"
                ),
                Err(e) => warn!(
                    instance = self.claimed.instance.id,
                    path = %descriptor.path.display(),
                    error = %e,
                    "Skipping deliverable"
                ),
            }
        }
    }

    async fn register_deliverable(
        &self,
        descriptor: &DeliverableDescriptor,
        scratch: Option<&Path>,
    ) -> Result<Deliverable, ExecutionError> {
        let instance_id = self.claimed.instance.id;

        let source = if descriptor.path.is_absolute() {
            descriptor.path.clone()
        } else if let Some(scratch) = scratch {
            scratch.join(&descriptor.path)
        } else {
            descriptor.path.clone()
        };

        let content_hash = hash_file(&source).await?;
        let random_id = uuid::Uuid::new_v4().simple().to_string();
        let file_name = Path::new(&descriptor.name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| random_id.clone());

        let store_dir =
            Path::new(&self.node.deliverable_root).join(format!("{:010}", instance_id));
        tokio::fs::create_dir_all(&store_dir).await?;
        let stored = store_dir.join(format!("{}_{}", random_id, file_name));
        tokio::fs::copy(&source, &stored).await?;

        let deliverable = self
            .dal
            .deliverable()
            .register(NewDeliverable {
                job_instance_id: instance_id,
                path: stored.to_string_lossy().to_string(),
                original_name: descriptor.name.clone(),
                family: descriptor.family.clone(),
                content_hash,
                random_id,
                created_at: chrono::Utc::now().naive_utc(),
            })
            .await?;
        Ok(deliverable)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.config.status_write_backoff * 2u32.saturating_pow(attempt - 1)
    }
}

/// Streams a file through SHA-256 and returns the lowercase hex digest.
async fn hash_file(path: &Path) -> std::io::Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 8192];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
