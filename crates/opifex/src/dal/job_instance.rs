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

//! Live job instance operations.
//!
//! Everything here works on rows that are still in flight. Terminal
//! transitions live in [`HistoryDAL`](super::HistoryDAL), which moves the
//! row out of this table, and the claim itself lives in
//! [`AttributionDAL`](super::AttributionDAL).

use chrono::Utc;
use diesel::prelude::*;

use super::DAL;
use crate::connection_match;
use crate::database::schema::{job_defs, job_instances, messages};
use crate::error::DataAccessError;
use crate::models::{JobDef, JobInstance, JobState, NewJobInstance, NewMessage};

/// Data access for [`JobInstance`] rows.
pub struct JobInstanceDAL<'a> {
    dal: &'a DAL,
}

impl<'a> JobInstanceDAL<'a> {
    /// Creates a new JobInstanceDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Inserts a new instance and returns its durable id.
    ///
    /// The id is stable for the life of the request and becomes the history
    /// id at completion.
    pub async fn submit(&self, new_instance: NewJobInstance) -> Result<i64, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let id = conn
            .interact(move |conn| {
                connection_match!(conn, conn => {
                    diesel::insert_into(job_instances::table)
                        .values(&new_instance)
                        .returning(job_instances::id)
                        .get_result::<i64>(conn)
                }, conn => {
                    diesel::insert_into(job_instances::table)
                        .values(&new_instance)
                        .returning(job_instances::id)
                        .get_result::<i64>(conn)
                })
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(id)
    }

    /// Fetches a live instance. `None` once it has reached a terminal state
    /// and moved to history.
    pub async fn get(&self, instance_id: i64) -> Result<Option<JobInstance>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let instance = conn
            .interact(move |conn| {
                job_instances::table
                    .find(instance_id)
                    .first::<JobInstance>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(instance)
    }

    /// Returns up to `batch` eligible candidates for one queue, most
    /// urgent first.
    ///
    /// Eligible means submitted, targeted at the queue, and past its
    /// not-before time. Ordering is priority descending, then enqueue date
    /// ascending, so the head of the list is the instance a poller should
    /// claim next.
    pub async fn scan_eligible(
        &self,
        queue_id: i64,
        batch: i64,
    ) -> Result<Vec<(JobInstance, JobDef)>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let candidates = conn
            .interact(move |conn| {
                let now = Utc::now().naive_utc();
                job_instances::table
                    .inner_join(job_defs::table)
                    .filter(job_instances::state.eq(JobState::Submitted.as_str()))
                    .filter(job_instances::queue_id.eq(queue_id))
                    .filter(
                        job_instances::not_before
                            .is_null()
                            .or(job_instances::not_before.le(now)),
                    )
                    .order((
                        job_instances::priority.desc(),
                        job_instances::enqueue_date.asc(),
                    ))
                    .limit(batch)
                    .load::<(JobInstance, JobDef)>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(candidates)
    }

    /// Counts instances of one definition that are claimed or executing
    /// anywhere in the cluster. This is the Highlander guard's view.
    pub async fn count_active_for_job_def(
        &self,
        job_def_id: i64,
    ) -> Result<i64, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let active = conn
            .interact(move |conn| {
                job_instances::table
                    .filter(job_instances::job_def_id.eq(job_def_id))
                    .filter(job_instances::state.eq_any([
                        JobState::Attributed.as_str(),
                        JobState::Running.as_str(),
                    ]))
                    .count()
                    .get_result::<i64>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(active)
    }

    /// Moves a claimed instance to `running` and records the execution
    /// start timestamp, appending the status note in the same transaction.
    ///
    /// Returns false if the instance was not in `attributed` state, in
    /// which case nothing was written.
    pub async fn mark_running(&self, instance_id: i64) -> Result<bool, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let updated = conn
            .interact(move |conn| {
                conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                    let now = Utc::now().naive_utc();
                    let updated = diesel::update(
                        job_instances::table
                            .filter(job_instances::id.eq(instance_id))
                            .filter(job_instances::state.eq(JobState::Attributed.as_str())),
                    )
                    .set((
                        job_instances::state.eq(JobState::Running.as_str()),
                        job_instances::execution_date.eq(Some(now)),
                    ))
                    .execute(conn)?;

                    if updated == 1 {
                        diesel::insert_into(messages::table)
                            .values(&NewMessage::status_change(
                                instance_id,
                                JobState::Running,
                                now,
                            ))
                            .execute(conn)?;
                    }
                    Ok(updated)
                })
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }

    /// Stores a progress value reported by the payload. Lost updates are
    /// acceptable; this is a plain overwrite.
    pub async fn set_progress(
        &self,
        instance_id: i64,
        progress: i32,
    ) -> Result<bool, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let updated = conn
            .interact(move |conn| {
                diesel::update(job_instances::table.find(instance_id))
                    .set(job_instances::progress.eq(progress))
                    .execute(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }

    /// Sets the durable kill flag on a running instance and notes the
    /// request. Returns false when the instance is not running.
    pub async fn request_kill(&self, instance_id: i64) -> Result<bool, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let updated = conn
            .interact(move |conn| {
                conn.transaction::<usize, diesel::result::Error, _>(|conn| {
                    let now = Utc::now().naive_utc();
                    let updated = diesel::update(
                        job_instances::table
                            .filter(job_instances::id.eq(instance_id))
                            .filter(job_instances::state.eq(JobState::Running.as_str())),
                    )
                    .set(job_instances::kill_requested.eq(true))
                    .execute(conn)?;

                    if updated == 1 {
                        diesel::insert_into(messages::table)
                            .values(&NewMessage {
                                job_instance_id: instance_id,
                                text_message: "Kill requested by operator".to_string(),
                                created_at: now,
                            })
                            .execute(conn)?;
                    }
                    Ok(updated)
                })
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(updated == 1)
    }

    /// Reads the kill flag. A vanished row reads as false: the instance
    /// already reached a terminal state, so there is nothing left to kill.
    pub async fn kill_requested(&self, instance_id: i64) -> Result<bool, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let flag = conn
            .interact(move |conn| {
                job_instances::table
                    .find(instance_id)
                    .select(job_instances::kill_requested)
                    .get_result::<bool>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(flag.unwrap_or(false))
    }
}
