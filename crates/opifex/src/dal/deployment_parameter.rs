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

//! Queue-to-node binding operations.

use chrono::Utc;
use diesel::prelude::*;

use super::DAL;
use crate::connection_match;
use crate::database::schema::{deployment_parameters, queues};
use crate::error::DataAccessError;
use crate::models::{DeploymentParameter, NewDeploymentParameter, Queue};

/// Data access for [`DeploymentParameter`] rows.
pub struct DeploymentParameterDAL<'a> {
    dal: &'a DAL,
}

impl<'a> DeploymentParameterDAL<'a> {
    /// Creates a new DeploymentParameterDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Binds a queue to a node. One poller will run for the binding.
    pub async fn bind(
        &self,
        node_id: i64,
        queue_id: i64,
        polling_interval_ms: i32,
        max_concurrent: i32,
    ) -> Result<DeploymentParameter, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let now = Utc::now().naive_utc();
        let new_binding = NewDeploymentParameter {
            node_id,
            queue_id,
            polling_interval_ms,
            max_concurrent,
            created_at: now,
            updated_at: now,
        };

        let binding = conn
            .interact(move |conn| {
                let id = connection_match!(conn, conn => {
                    diesel::insert_into(deployment_parameters::table)
                        .values(&new_binding)
                        .returning(deployment_parameters::id)
                        .get_result::<i64>(conn)?
                }, conn => {
                    diesel::insert_into(deployment_parameters::table)
                        .values(&new_binding)
                        .returning(deployment_parameters::id)
                        .get_result::<i64>(conn)?
                });
                deployment_parameters::table
                    .find(id)
                    .first::<DeploymentParameter>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(binding)
    }

    /// Lists the bindings a node polls for, with their queues.
    pub async fn for_node(
        &self,
        node_id: i64,
    ) -> Result<Vec<(DeploymentParameter, Queue)>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let bindings = conn
            .interact(move |conn| {
                deployment_parameters::table
                    .inner_join(queues::table)
                    .filter(deployment_parameters::node_id.eq(node_id))
                    .order(deployment_parameters::id.asc())
                    .load::<(DeploymentParameter, Queue)>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(bindings)
    }
}
