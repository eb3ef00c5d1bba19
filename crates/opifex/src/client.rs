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

//! # Client Interface
//!
//! Typed, in-process access to the job store: submission, cancellation,
//! kill requests, status and deliverable retrieval. The client talks to
//! the same database the engines poll, so a submission made here is
//! visible to every node's next scan.
//!
//! ## Key Components
//!
//! - **JobRequest**: a fluent submission builder
//! - **Client**: the operations themselves
//! - **InstanceStatus**: live-or-finished view of one instance
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use opifex::{Client, JobRequest};
//!
//! let id = client
//!     .submit(
//!         JobRequest::new("nightly-report")
//!             .priority(5)
//!             .parameter("format", "csv")
//!             .user_name("batch"),
//!     )
//!     .await?;
//!
//! let status = client.status(id).await?;
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::dal::DAL;
use crate::error::DataAccessError;
use crate::models::{Deliverable, History, JobInstance, JobState, Message, NewJobInstance};

/// A submission request for one job instance.
///
/// Everything beyond the application name is optional; unset knobs fall
/// back to the job definition's values.
#[derive(Debug, Clone)]
pub struct JobRequest {
    application_name: String,
    queue: Option<String>,
    priority: i32,
    not_before: Option<DateTime<Utc>>,
    parameters: BTreeMap<String, String>,
    parent_id: Option<i64>,
    session_id: Option<String>,
    user_name: Option<String>,
    email: Option<String>,
}

impl JobRequest {
    /// Starts a request for the named job definition.
    pub fn new(application_name: &str) -> Self {
        Self {
            application_name: application_name.to_string(),
            queue: None,
            priority: 0,
            not_before: None,
            parameters: BTreeMap::new(),
            parent_id: None,
            session_id: None,
            user_name: None,
            email: None,
        }
    }

    /// Targets a queue by name instead of the definition's queue.
    pub fn queue(mut self, name: &str) -> Self {
        self.queue = Some(name.to_string());
        self
    }

    /// Sets the selection priority. Higher runs first.
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Defers eligibility until the given time.
    pub fn not_before(mut self, when: DateTime<Utc>) -> Self {
        self.not_before = Some(when);
        self
    }

    /// Overrides or extends one definition parameter for this instance.
    pub fn parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters.insert(name.to_string(), value.to_string());
        self
    }

    /// Marks the submitting instance, for jobs that spawn jobs.
    pub fn parent(mut self, instance_id: i64) -> Self {
        self.parent_id = Some(instance_id);
        self
    }

    /// Attaches a client session tag.
    pub fn session_id(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Attaches the submitting user's name.
    pub fn user_name(mut self, user_name: &str) -> Self {
        self.user_name = Some(user_name.to_string());
        self
    }

    /// Attaches a notification address tag.
    pub fn email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }
}

/// Where one instance currently stands.
#[derive(Debug, Clone)]
pub enum InstanceStatus {
    /// Still in the live table, somewhere before a terminal state.
    Live(JobInstance),
    /// Finished; the durable outcome record.
    Finished(History),
}

impl InstanceStatus {
    /// The parsed state, `None` if the stored value is unknown.
    pub fn state(&self) -> Option<JobState> {
        match self {
            InstanceStatus::Live(instance) => JobState::parse(&instance.state),
            InstanceStatus::Finished(history) => JobState::parse(&history.state),
        }
    }

    /// Last progress value the payload reported.
    pub fn progress(&self) -> i32 {
        match self {
            InstanceStatus::Live(instance) => instance.progress,
            InstanceStatus::Finished(history) => history.progress,
        }
    }

    /// The payload's return code, present only for finished runs that
    /// returned one.
    pub fn return_code(&self) -> Option<i32> {
        match self {
            InstanceStatus::Live(_) => None,
            InstanceStatus::Finished(history) => history.return_code,
        }
    }

    /// True once the instance has a durable outcome.
    pub fn is_finished(&self) -> bool {
        matches!(self, InstanceStatus::Finished(_))
    }
}

/// In-process client over the engine's store.
#[derive(Debug, Clone)]
pub struct Client {
    dal: DAL,
}

impl Client {
    /// Creates a client over an existing data access layer.
    pub fn new(dal: DAL) -> Self {
        Self { dal }
    }

    /// Submits a job instance and returns its durable id.
    ///
    /// The application name must match an enabled job definition. The
    /// target queue is the definition's unless the request names another
    /// one.
    pub async fn submit(&self, request: JobRequest) -> Result<i64, DataAccessError> {
        let job_def = self
            .dal
            .job_def()
            .by_application_name(&request.application_name)
            .await?
            .ok_or_else(|| DataAccessError::Invalid {
                field: "application_name",
                reason: format!("No job definition named '{}'", request.application_name),
            })?;
        if !job_def.enabled {
            return Err(DataAccessError::Invalid {
                field: "application_name",
                reason: format!("Job definition '{}' is disabled", request.application_name),
            });
        }

        let queue_id = match &request.queue {
            Some(name) => {
                self.dal
                    .queue()
                    .by_name(name)
                    .await?
                    .ok_or_else(|| DataAccessError::Invalid {
                        field: "queue",
                        reason: format!("No queue named '{}'", name),
                    })?
                    .id
            }
            None => job_def.queue_id,
        };

        let parameters =
            serde_json::to_string(&request.parameters).map_err(|e| DataAccessError::Invalid {
                field: "parameters",
                reason: e.to_string(),
            })?;

        let new_instance = NewJobInstance {
            job_def_id: job_def.id,
            queue_id,
            node_id: None,
            state: JobState::Submitted.as_str().to_string(),
            priority: request.priority,
            not_before: request.not_before.map(|t| t.naive_utc()),
            enqueue_date: Utc::now().naive_utc(),
            attribution_date: None,
            execution_date: None,
            progress: 0,
            kill_requested: false,
            parent_id: request.parent_id,
            session_id: request.session_id,
            user_name: request.user_name,
            email: request.email,
            parameters,
        };
        self.dal.job_instance().submit(new_instance).await
    }

    /// Cancels an instance that has not been claimed yet.
    ///
    /// Succeeds only while the instance is still `submitted`; a
    /// [`DataAccessError::Conflict`] means some node got to it first.
    pub async fn cancel(&self, instance_id: i64) -> Result<History, DataAccessError> {
        self.dal.history().create_for_cancellation(instance_id).await
    }

    /// Asks for a running instance to be killed.
    ///
    /// Returns false when the instance is not currently `running`. The
    /// kill is honored by subprocess payloads at the next kill poll;
    /// in-process payloads cannot be force-killed and only stop if they
    /// choose to observe the flag.
    pub async fn request_kill(&self, instance_id: i64) -> Result<bool, DataAccessError> {
        self.dal.job_instance().request_kill(instance_id).await
    }

    /// Looks an instance up in the live table first, then in history.
    pub async fn status(&self, instance_id: i64) -> Result<InstanceStatus, DataAccessError> {
        if let Some(instance) = self.dal.job_instance().get(instance_id).await? {
            return Ok(InstanceStatus::Live(instance));
        }
        if let Some(history) = self.dal.history().get(instance_id).await? {
            return Ok(InstanceStatus::Finished(history));
        }
        Err(DataAccessError::NotFound {
            entity: "job instance",
            id: instance_id.to_string(),
        })
    }

    /// The last progress value an instance reported, `None` for ids that
    /// exist nowhere.
    pub async fn progress(&self, instance_id: i64) -> Result<Option<i32>, DataAccessError> {
        match self.status(instance_id).await {
            Ok(status) => Ok(Some(status.progress())),
            Err(DataAccessError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Files registered by a finished instance, in registration order.
    pub async fn deliverables(
        &self,
        instance_id: i64,
    ) -> Result<Vec<Deliverable>, DataAccessError> {
        self.dal.deliverable().list_for_instance(instance_id).await
    }

    /// Resolves a deliverable's opaque retrieval id to its stored path.
    pub async fn deliverable_path(&self, random_id: &str) -> Result<PathBuf, DataAccessError> {
        let deliverable = self
            .dal
            .deliverable()
            .by_random_id(random_id)
            .await?
            .ok_or_else(|| DataAccessError::NotFound {
                entity: "deliverable",
                id: random_id.to_string(),
            })?;
        Ok(PathBuf::from(deliverable.path))
    }

    /// Notes attached to an instance, oldest first.
    pub async fn notes(&self, instance_id: i64) -> Result<Vec<Message>, DataAccessError> {
        self.dal.message().list_for_instance(instance_id).await
    }
}
