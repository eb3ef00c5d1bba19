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

//! Job instance model.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::job_def::JobDef;
use super::state::JobState;

/// One execution request.
///
/// The row exists only while the request is live (`submitted`, `attributed`
/// or `running`); a terminal transition moves the outcome to `history` under
/// the same id and deletes this row in the same transaction.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::job_instances)]
pub struct JobInstance {
    /// Durable identifier, stable for the life of the request and reused as
    /// the history id at completion
    pub id: i64,
    /// The definition this instance runs
    pub job_def_id: i64,
    /// Target queue
    pub queue_id: i64,
    /// Node that attributed the instance, set at claim time
    pub node_id: Option<i64>,
    /// Current state, see [`JobState`]
    pub state: String,
    /// Selection priority, higher first
    pub priority: i32,
    /// Earliest eligible execution time; `None` means immediately eligible
    pub not_before: Option<NaiveDateTime>,
    /// Submission timestamp
    pub enqueue_date: NaiveDateTime,
    /// Claim timestamp, set by the winning node
    pub attribution_date: Option<NaiveDateTime>,
    /// Entry-point invocation timestamp
    pub execution_date: Option<NaiveDateTime>,
    /// Coarse progress reported by the payload
    pub progress: i32,
    /// Set by an operator to request termination of a running instance
    pub kill_requested: bool,
    /// Instance that submitted this one, if any
    pub parent_id: Option<i64>,
    /// Client session tag
    pub session_id: Option<String>,
    /// Submitting user tag
    pub user_name: Option<String>,
    /// Notification address tag
    pub email: Option<String>,
    /// Per-instance parameter overrides as a JSON object of string values
    pub parameters: String,
}

impl JobInstance {
    /// The parsed state, `None` if the stored value is unknown.
    pub fn job_state(&self) -> Option<JobState> {
        JobState::parse(&self.state)
    }

    /// Parses the override parameter map. Malformed JSON yields an empty
    /// map.
    pub fn parameter_map(&self) -> BTreeMap<String, String> {
        serde_json::from_str(&self.parameters).unwrap_or_default()
    }

    /// The parameter map the payload actually sees: the definition's
    /// defaults with this instance's overrides applied on top.
    pub fn effective_parameters(&self, job_def: &JobDef) -> BTreeMap<String, String> {
        let mut merged = job_def.default_parameter_map();
        merged.extend(self.parameter_map());
        merged
    }
}

/// Insertable form of [`JobInstance`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::job_instances)]
pub struct NewJobInstance {
    pub job_def_id: i64,
    pub queue_id: i64,
    pub node_id: Option<i64>,
    pub state: String,
    pub priority: i32,
    pub not_before: Option<NaiveDateTime>,
    pub enqueue_date: NaiveDateTime,
    pub attribution_date: Option<NaiveDateTime>,
    pub execution_date: Option<NaiveDateTime>,
    pub progress: i32,
    pub kill_requested: bool,
    pub parent_id: Option<i64>,
    pub session_id: Option<String>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub parameters: String,
}
