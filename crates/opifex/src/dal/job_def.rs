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

//! Job definition operations.

use chrono::Utc;
use diesel::prelude::*;

use super::DAL;
use crate::connection_match;
use crate::database::schema::job_defs;
use crate::error::DataAccessError;
use crate::models::{JobDef, NewJobDef};

/// Data access for [`JobDef`] rows.
pub struct JobDefDAL<'a> {
    dal: &'a DAL,
}

impl<'a> JobDefDAL<'a> {
    /// Creates a new JobDefDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a job definition.
    pub async fn create(&self, new_job_def: NewJobDef) -> Result<JobDef, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let job_def = conn
            .interact(move |conn| {
                let id = connection_match!(conn, conn => {
                    diesel::insert_into(job_defs::table)
                        .values(&new_job_def)
                        .returning(job_defs::id)
                        .get_result::<i64>(conn)?
                }, conn => {
                    diesel::insert_into(job_defs::table)
                        .values(&new_job_def)
                        .returning(job_defs::id)
                        .get_result::<i64>(conn)?
                });
                job_defs::table.find(id).first::<JobDef>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(job_def)
    }

    /// Fetches a definition by id.
    pub async fn get(&self, job_def_id: i64) -> Result<JobDef, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let job_def = conn
            .interact(move |conn| {
                job_defs::table
                    .find(job_def_id)
                    .first::<JobDef>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        job_def.ok_or(DataAccessError::NotFound {
            entity: "job definition",
            id: job_def_id.to_string(),
        })
    }

    /// Fetches a definition by its application name, the key clients submit
    /// against.
    pub async fn by_application_name(
        &self,
        application_name: &str,
    ) -> Result<Option<JobDef>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let application_name = application_name.to_string();
        let job_def = conn
            .interact(move |conn| {
                job_defs::table
                    .filter(job_defs::application_name.eq(&application_name))
                    .first::<JobDef>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(job_def)
    }

    /// Enables or disables new submissions for a definition.
    pub async fn set_enabled(&self, job_def_id: i64, enabled: bool) -> Result<(), DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            diesel::update(job_defs::table.find(job_def_id))
                .set((
                    job_defs::enabled.eq(enabled),
                    job_defs::updated_at.eq(Utc::now().naive_utc()),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(())
    }
}
