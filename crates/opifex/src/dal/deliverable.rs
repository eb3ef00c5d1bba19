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

//! Deliverable registration and retrieval.

use diesel::prelude::*;

use super::DAL;
use crate::connection_match;
use crate::database::schema::deliverables;
use crate::error::DataAccessError;
use crate::models::{Deliverable, NewDeliverable};

/// Data access for [`Deliverable`] rows.
pub struct DeliverableDAL<'a> {
    dal: &'a DAL,
}

impl<'a> DeliverableDAL<'a> {
    /// Creates a new DeliverableDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Records one produced file after it has been copied into the
    /// deliverable store.
    pub async fn register(
        &self,
        new_deliverable: NewDeliverable,
    ) -> Result<Deliverable, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let deliverable = conn
            .interact(move |conn| {
                let id = connection_match!(conn, conn => {
                    diesel::insert_into(deliverables::table)
                        .values(&new_deliverable)
                        .returning(deliverables::id)
                        .get_result::<i64>(conn)
                }, conn => {
                    diesel::insert_into(deliverables::table)
                        .values(&new_deliverable)
                        .returning(deliverables::id)
                        .get_result::<i64>(conn)
                })?;
                deliverables::table.find(id).first::<Deliverable>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(deliverable)
    }

    /// Lists everything an instance produced, in registration order.
    /// Survives the instance reaching a terminal state.
    pub async fn list_for_instance(
        &self,
        instance_id: i64,
    ) -> Result<Vec<Deliverable>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let rows = conn
            .interact(move |conn| {
                deliverables::table
                    .filter(deliverables::job_instance_id.eq(instance_id))
                    .order(deliverables::id.asc())
                    .load::<Deliverable>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }

    /// Looks up a deliverable by its opaque retrieval id.
    pub async fn by_random_id(
        &self,
        random_id: &str,
    ) -> Result<Option<Deliverable>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let random_id = random_id.to_string();
        let deliverable = conn
            .interact(move |conn| {
                deliverables::table
                    .filter(deliverables::random_id.eq(random_id))
                    .first::<Deliverable>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(deliverable)
    }
}
