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

//! Atomic attribution of job instances to nodes.
//!
//! Any number of pollers on any number of nodes may race for the same
//! candidate. The claim is a conditional update keyed on the submitted
//! state, so exactly one racer observes a row count of one and wins. The
//! losers see zero rows and move on without error.
//!
//! When a definition is marked Highlander the claim first takes a row
//! lock on the definition itself, which serializes competing claimers of
//! that definition across connections and makes the singleton check and
//! the claim one atomic step. SQLite gets the same effect from an
//! immediate transaction, which takes the write lock up front.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::result::Error as DieselError;

use super::DAL;
use crate::database::schema::{job_defs, job_instances, messages};
use crate::database::AnyConnection;
use crate::error::DataAccessError;
use crate::models::{JobDef, JobState, NewMessage};

/// Result of one attribution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// This node now owns the instance. It is in `attributed` state with
    /// the node id and attribution timestamp recorded.
    Won,
    /// Another node claimed the instance first, or it left the submitted
    /// state some other way (cancellation). Not an error.
    Lost,
    /// The definition is Highlander and another instance of it is already
    /// attributed or running somewhere. The candidate stays submitted.
    HighlanderBlocked,
}

/// Data access for claiming instances on behalf of a node.
pub struct AttributionDAL<'a> {
    dal: &'a DAL,
}

macro_rules! claim_body {
    ($conn:expr, $instance_id:expr, $job_def_id:expr, $highlander:expr, $node_id:expr, $now:expr) => {{
        if $highlander {
            let active: i64 = job_instances::table
                .filter(job_instances::job_def_id.eq($job_def_id))
                .filter(job_instances::state.eq_any([
                    JobState::Attributed.as_str(),
                    JobState::Running.as_str(),
                ]))
                .count()
                .get_result($conn)?;
            if active > 0 {
                return Ok(ClaimOutcome::HighlanderBlocked);
            }
        }

        let updated = diesel::update(
            job_instances::table
                .filter(job_instances::id.eq($instance_id))
                .filter(job_instances::state.eq(JobState::Submitted.as_str())),
        )
        .set((
            job_instances::state.eq(JobState::Attributed.as_str()),
            job_instances::node_id.eq(Some($node_id)),
            job_instances::attribution_date.eq(Some($now)),
        ))
        .execute($conn)?;

        if updated == 1 {
            diesel::insert_into(messages::table)
                .values(&NewMessage::status_change(
                    $instance_id,
                    JobState::Attributed,
                    $now,
                ))
                .execute($conn)?;
            Ok(ClaimOutcome::Won)
        } else {
            Ok(ClaimOutcome::Lost)
        }
    }};
}

impl<'a> AttributionDAL<'a> {
    /// Creates a new AttributionDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Attempts to claim one candidate for `node_id`.
    ///
    /// On success the instance moves to `attributed` with the node and
    /// attribution timestamp set, and a status note is appended, all in
    /// one transaction. Losing the race is reported as an outcome, not an
    /// error, so callers can simply continue with the next candidate.
    pub async fn claim(
        &self,
        instance_id: i64,
        job_def_id: i64,
        highlander: bool,
        node_id: i64,
    ) -> Result<ClaimOutcome, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let outcome = conn
            .interact(move |conn| {
                let now: NaiveDateTime = chrono::Utc::now().naive_utc();
                match conn {
                    #[cfg(feature = "postgres")]
                    AnyConnection::Postgres(pg_conn) => {
                        pg_conn.transaction::<ClaimOutcome, DieselError, _>(|conn| {
                            if highlander {
                                // Lock the definition row so concurrent
                                // claimers of the same Highlander definition
                                // queue up here instead of both passing the
                                // singleton check under READ COMMITTED.
                                job_defs::table
                                    .find(job_def_id)
                                    .for_update()
                                    .first::<JobDef>(conn)?;
                            }
                            claim_body!(conn, instance_id, job_def_id, highlander, node_id, now)
                        })
                    }
                    #[cfg(feature = "sqlite")]
                    AnyConnection::Sqlite(sqlite_conn) => sqlite_conn
                        .immediate_transaction::<ClaimOutcome, DieselError, _>(|conn| {
                            claim_body!(conn, instance_id, job_def_id, highlander, node_id, now)
                        }),
                }
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(outcome)
    }
}
