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

//! Terminal transitions.
//!
//! A job instance leaves the live table exactly once, and the history row
//! is written in the same transaction that deletes it. The delete is
//! guarded by the expected current state, so two writers racing to finish
//! the same instance (say the loader ending it while an operator kill
//! lands) cannot both succeed: the loser's delete matches zero rows and
//! the whole transaction rolls back as a [`DataAccessError::Conflict`].

use chrono::Utc;
use diesel::prelude::*;
use diesel::result::Error as DieselError;

use super::DAL;
use crate::database::schema::{history, job_defs, job_instances, messages, nodes, queues};
use crate::error::DataAccessError;
use crate::models::{History, JobDef, JobInstance, JobState, NewHistory, NewMessage};

/// Data access for [`History`] rows.
pub struct HistoryDAL<'a> {
    dal: &'a DAL,
}

impl<'a> HistoryDAL<'a> {
    /// Creates a new HistoryDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Fetches the terminal record for an instance, if it has one.
    pub async fn get(&self, instance_id: i64) -> Result<Option<History>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let record = conn
            .interact(move |conn| {
                history::table
                    .find(instance_id)
                    .first::<History>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(record)
    }

    /// Finishes a running instance.
    ///
    /// `final_state` must be one of `ended`, `crashed` or `killed`. The
    /// history row snapshots the instance and its definition, carries the
    /// payload return code when there is one, and gets an end date. The
    /// live row is deleted and the status note appended in the same
    /// transaction.
    ///
    /// Fails with [`DataAccessError::Conflict`] when the instance is no
    /// longer in `running` state, which means another writer finished it
    /// first. Nothing is written in that case.
    pub async fn create_for_run(
        &self,
        instance_id: i64,
        final_state: JobState,
        return_code: Option<i32>,
    ) -> Result<History, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let result = conn
            .interact(move |conn| {
                conn.transaction::<History, DieselError, _>(|conn| {
                    let instance = match job_instances::table
                        .find(instance_id)
                        .first::<JobInstance>(conn)
                        .optional()?
                    {
                        Some(instance) => instance,
                        None => return Err(DieselError::RollbackTransaction),
                    };
                    let job_def = job_defs::table
                        .find(instance.job_def_id)
                        .first::<JobDef>(conn)?;
                    let queue_name = queues::table
                        .find(instance.queue_id)
                        .select(queues::name)
                        .get_result::<String>(conn)?;
                    let node_name = match instance.node_id {
                        Some(node_id) => nodes::table
                            .find(node_id)
                            .select(nodes::name)
                            .get_result::<String>(conn)
                            .optional()?,
                        None => None,
                    };

                    let deleted = diesel::delete(
                        job_instances::table
                            .filter(job_instances::id.eq(instance_id))
                            .filter(job_instances::state.eq(JobState::Running.as_str())),
                    )
                    .execute(conn)?;
                    if deleted != 1 {
                        return Err(DieselError::RollbackTransaction);
                    }

                    let now = Utc::now().naive_utc();
                    diesel::insert_into(history::table)
                        .values(&NewHistory {
                            id: instance_id,
                            application_name: job_def.application_name,
                            queue_name,
                            node_name,
                            state: final_state.as_str().to_string(),
                            return_code,
                            priority: instance.priority,
                            progress: instance.progress,
                            enqueue_date: instance.enqueue_date,
                            attribution_date: instance.attribution_date,
                            execution_date: instance.execution_date,
                            end_date: Some(now),
                            highlander: job_def.highlander,
                            application: job_def.application,
                            module: job_def.module,
                            keyword1: job_def.keyword1,
                            keyword2: job_def.keyword2,
                            keyword3: job_def.keyword3,
                            session_id: instance.session_id,
                            user_name: instance.user_name,
                            email: instance.email,
                            parent_id: instance.parent_id,
                        })
                        .execute(conn)?;
                    diesel::insert_into(messages::table)
                        .values(&NewMessage::status_change(instance_id, final_state, now))
                        .execute(conn)?;

                    history::table.find(instance_id).first::<History>(conn)
                })
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        match result {
            Ok(record) => Ok(record),
            Err(DieselError::RollbackTransaction) => Err(DataAccessError::Conflict(instance_id)),
            Err(e) => Err(DataAccessError::Query(e)),
        }
    }

    /// Cancels an instance that never started.
    ///
    /// Only a `submitted` instance can be cancelled. The history row gets
    /// no node name, no return code and, alone among terminal records, no
    /// end date. Fails with [`DataAccessError::Conflict`] when a node
    /// claimed the instance first.
    pub async fn create_for_cancellation(
        &self,
        instance_id: i64,
    ) -> Result<History, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let result = conn
            .interact(move |conn| {
                conn.transaction::<History, DieselError, _>(|conn| {
                    let instance = match job_instances::table
                        .find(instance_id)
                        .first::<JobInstance>(conn)
                        .optional()?
                    {
                        Some(instance) => instance,
                        None => return Err(DieselError::RollbackTransaction),
                    };
                    let job_def = job_defs::table
                        .find(instance.job_def_id)
                        .first::<JobDef>(conn)?;
                    let queue_name = queues::table
                        .find(instance.queue_id)
                        .select(queues::name)
                        .get_result::<String>(conn)?;

                    let deleted = diesel::delete(
                        job_instances::table
                            .filter(job_instances::id.eq(instance_id))
                            .filter(job_instances::state.eq(JobState::Submitted.as_str())),
                    )
                    .execute(conn)?;
                    if deleted != 1 {
                        return Err(DieselError::RollbackTransaction);
                    }

                    let now = Utc::now().naive_utc();
                    diesel::insert_into(history::table)
                        .values(&NewHistory {
                            id: instance_id,
                            application_name: job_def.application_name,
                            queue_name,
                            node_name: None,
                            state: JobState::Cancelled.as_str().to_string(),
                            return_code: None,
                            priority: instance.priority,
                            progress: instance.progress,
                            enqueue_date: instance.enqueue_date,
                            attribution_date: instance.attribution_date,
                            execution_date: instance.execution_date,
                            end_date: None,
                            highlander: job_def.highlander,
                            application: job_def.application,
                            module: job_def.module,
                            keyword1: job_def.keyword1,
                            keyword2: job_def.keyword2,
                            keyword3: job_def.keyword3,
                            session_id: instance.session_id,
                            user_name: instance.user_name,
                            email: instance.email,
                            parent_id: instance.parent_id,
                        })
                        .execute(conn)?;
                    diesel::insert_into(messages::table)
                        .values(&NewMessage::status_change(
                            instance_id,
                            JobState::Cancelled,
                            now,
                        ))
                        .execute(conn)?;

                    history::table.find(instance_id).first::<History>(conn)
                })
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        match result {
            Ok(record) => Ok(record),
            Err(DieselError::RollbackTransaction) => Err(DataAccessError::Conflict(instance_id)),
            Err(e) => Err(DataAccessError::Query(e)),
        }
    }
}
