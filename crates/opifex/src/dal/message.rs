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

//! Append-only notes attached to job instances.

use diesel::prelude::*;

use super::DAL;
use crate::database::schema::messages;
use crate::error::DataAccessError;
use crate::models::{Message, NewMessage};

/// Data access for [`Message`] rows.
pub struct MessageDAL<'a> {
    dal: &'a DAL,
}

impl<'a> MessageDAL<'a> {
    /// Creates a new MessageDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Appends one note. Notes are never updated or deleted.
    pub async fn append(&self, new_message: NewMessage) -> Result<(), DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            diesel::insert_into(messages::table)
                .values(&new_message)
                .execute(conn)
        })
        .await
        .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// All notes for an instance in append order. Works for live and
    /// finished instances alike.
    pub async fn list_for_instance(
        &self,
        instance_id: i64,
    ) -> Result<Vec<Message>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let rows = conn
            .interact(move |conn| {
                messages::table
                    .filter(messages::job_instance_id.eq(instance_id))
                    .order(messages::id.asc())
                    .load::<Message>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(rows)
    }
}
