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

//! Instance note model.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::state::JobState;

/// A free-text note attached to a job instance. The engine appends one per
/// state transition; payloads may add their own. Notes keep the instance id
/// after the instance itself moves to history.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::messages)]
pub struct Message {
    pub id: i64,
    pub job_instance_id: i64,
    pub text_message: String,
    pub created_at: NaiveDateTime,
}

/// Insertable form of [`Message`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::messages)]
pub struct NewMessage {
    pub job_instance_id: i64,
    pub text_message: String,
    pub created_at: NaiveDateTime,
}

impl NewMessage {
    /// The note written alongside every state transition.
    pub fn status_change(job_instance_id: i64, state: JobState, at: NaiveDateTime) -> Self {
        Self {
            job_instance_id,
            text_message: format!("Status updated: {}", state.as_str().to_uppercase()),
            created_at: at,
        }
    }
}
