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

//! Terminal outcome model.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::state::JobState;

/// The durable record of a finished or cancelled job instance.
///
/// Identity and classification fields are copied from the instance and its
/// definition at write time, so the record stands alone even if the
/// definition later changes or disappears. Written exactly once per
/// instance, in the same transaction that removes the live row.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::history)]
pub struct History {
    /// The job instance id this record belongs to
    pub id: i64,
    /// Application name of the definition at completion time
    pub application_name: String,
    /// Target queue name
    pub queue_name: String,
    /// Name of the node that executed the instance; `None` when it was
    /// cancelled before attribution
    pub node_name: Option<String>,
    /// Final state: ended, crashed, cancelled or killed
    pub state: String,
    /// Payload return code; absent for infrastructure failures and
    /// cancellations
    pub return_code: Option<i32>,
    /// Selection priority at submission
    pub priority: i32,
    /// Last progress value reported
    pub progress: i32,
    /// Submission timestamp
    pub enqueue_date: NaiveDateTime,
    /// Claim timestamp
    pub attribution_date: Option<NaiveDateTime>,
    /// Entry-point invocation timestamp
    pub execution_date: Option<NaiveDateTime>,
    /// Completion timestamp; null if and only if the instance was cancelled
    /// before it ever ran
    pub end_date: Option<NaiveDateTime>,
    /// Highlander flag of the definition
    pub highlander: bool,
    /// Classification: owning application
    pub application: Option<String>,
    /// Classification: module
    pub module: Option<String>,
    /// Classification keyword
    pub keyword1: Option<String>,
    /// Classification keyword
    pub keyword2: Option<String>,
    /// Classification keyword
    pub keyword3: Option<String>,
    /// Client session tag
    pub session_id: Option<String>,
    /// Submitting user tag
    pub user_name: Option<String>,
    /// Notification address tag
    pub email: Option<String>,
    /// Submitting instance, if any
    pub parent_id: Option<i64>,
}

impl History {
    /// The parsed final state, `None` if the stored value is unknown.
    pub fn job_state(&self) -> Option<JobState> {
        JobState::parse(&self.state)
    }
}

/// Insertable form of [`History`]. The id is assigned by the writer (it is
/// the job instance id), never by the database.
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::history)]
pub struct NewHistory {
    pub id: i64,
    pub application_name: String,
    pub queue_name: String,
    pub node_name: Option<String>,
    pub state: String,
    pub return_code: Option<i32>,
    pub priority: i32,
    pub progress: i32,
    pub enqueue_date: NaiveDateTime,
    pub attribution_date: Option<NaiveDateTime>,
    pub execution_date: Option<NaiveDateTime>,
    pub end_date: Option<NaiveDateTime>,
    pub highlander: bool,
    pub application: Option<String>,
    pub module: Option<String>,
    pub keyword1: Option<String>,
    pub keyword2: Option<String>,
    pub keyword3: Option<String>,
    pub session_id: Option<String>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub parent_id: Option<i64>,
}
