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

//! Queue operations.

use chrono::Utc;
use diesel::prelude::*;

use super::DAL;
use crate::connection_match;
use crate::database::schema::queues;
use crate::error::DataAccessError;
use crate::models::{NewQueue, Queue};

/// Data access for [`Queue`] rows.
pub struct QueueDAL<'a> {
    dal: &'a DAL,
}

impl<'a> QueueDAL<'a> {
    /// Creates a new QueueDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Creates a queue.
    pub async fn create(
        &self,
        name: &str,
        description: &str,
        is_default: bool,
    ) -> Result<Queue, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let now = Utc::now().naive_utc();
        let new_queue = NewQueue {
            name: name.to_string(),
            description: description.to_string(),
            is_default,
            created_at: now,
            updated_at: now,
        };

        let queue = conn
            .interact(move |conn| {
                let id = connection_match!(conn, conn => {
                    diesel::insert_into(queues::table)
                        .values(&new_queue)
                        .returning(queues::id)
                        .get_result::<i64>(conn)?
                }, conn => {
                    diesel::insert_into(queues::table)
                        .values(&new_queue)
                        .returning(queues::id)
                        .get_result::<i64>(conn)?
                });
                queues::table.find(id).first::<Queue>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(queue)
    }

    /// Fetches a queue by id.
    pub async fn get(&self, queue_id: i64) -> Result<Queue, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let queue = conn
            .interact(move |conn| queues::table.find(queue_id).first::<Queue>(conn).optional())
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        queue.ok_or(DataAccessError::NotFound {
            entity: "queue",
            id: queue_id.to_string(),
        })
    }

    /// Fetches a queue by functional name.
    pub async fn by_name(&self, name: &str) -> Result<Option<Queue>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let queue = conn
            .interact(move |conn| {
                queues::table
                    .filter(queues::name.eq(&name))
                    .first::<Queue>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(queue)
    }

    /// Fetches the default queue, if one is marked.
    pub async fn default_queue(&self) -> Result<Option<Queue>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let queue = conn
            .interact(move |conn| {
                queues::table
                    .filter(queues::is_default.eq(true))
                    .first::<Queue>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(queue)
    }
}
