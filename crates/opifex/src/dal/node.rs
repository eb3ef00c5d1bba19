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

//! Cluster membership operations.

use chrono::Utc;
use diesel::prelude::*;

use super::DAL;
use crate::connection_match;
use crate::database::schema::nodes;
use crate::error::DataAccessError;
use crate::models::{NewNode, Node};

/// Data access for [`Node`] rows.
pub struct NodeDAL<'a> {
    dal: &'a DAL,
}

impl<'a> NodeDAL<'a> {
    /// Creates a new NodeDAL instance.
    pub fn new(dal: &'a DAL) -> Self {
        Self { dal }
    }

    /// Registers this engine's node row, creating it on first start and
    /// refreshing it afterwards.
    ///
    /// Registration is idempotent per name: an existing row keeps its id,
    /// gets the supplied repository paths, a cleared stop flag and a fresh
    /// heartbeat.
    pub async fn register(
        &self,
        name: &str,
        log_root: &str,
        deliverable_root: &str,
        tmp_root: &str,
    ) -> Result<Node, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let log_root = log_root.to_string();
        let deliverable_root = deliverable_root.to_string();
        let tmp_root = tmp_root.to_string();

        let node = conn
            .interact(move |conn| {
                conn.transaction::<Node, diesel::result::Error, _>(|conn| {
                    let now = Utc::now().naive_utc();
                    let existing: Option<Node> = nodes::table
                        .filter(nodes::name.eq(&name))
                        .first(conn)
                        .optional()?;

                    let id = match existing {
                        Some(node) => {
                            diesel::update(nodes::table.find(node.id))
                                .set((
                                    nodes::log_root.eq(&log_root),
                                    nodes::deliverable_root.eq(&deliverable_root),
                                    nodes::tmp_root.eq(&tmp_root),
                                    nodes::stop_requested.eq(false),
                                    nodes::last_seen_alive.eq(Some(now)),
                                    nodes::updated_at.eq(now),
                                ))
                                .execute(conn)?;
                            node.id
                        }
                        None => {
                            let new_node = NewNode {
                                name: name.clone(),
                                log_root: log_root.clone(),
                                deliverable_root: deliverable_root.clone(),
                                tmp_root: tmp_root.clone(),
                                stop_requested: false,
                                last_seen_alive: Some(now),
                                created_at: now,
                                updated_at: now,
                            };
                            connection_match!(conn, conn => {
                                diesel::insert_into(nodes::table)
                                    .values(&new_node)
                                    .returning(nodes::id)
                                    .get_result::<i64>(conn)?
                            }, conn => {
                                diesel::insert_into(nodes::table)
                                    .values(&new_node)
                                    .returning(nodes::id)
                                    .get_result::<i64>(conn)?
                            })
                        }
                    };

                    nodes::table.find(id).first(conn)
                })
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(node)
    }

    /// Refreshes the node's liveness timestamp.
    pub async fn heartbeat(&self, node_id: i64) -> Result<(), DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        conn.interact(move |conn| {
            let now = Utc::now().naive_utc();
            diesel::update(nodes::table.find(node_id))
                .set((
                    nodes::last_seen_alive.eq(Some(now)),
                    nodes::updated_at.eq(now),
                ))
                .execute(conn)
        })
        .await
        .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(())
    }

    /// Durably asks the engine hosting `name` to wind down. Returns false
    /// when no such node exists.
    pub async fn request_stop(&self, name: &str) -> Result<bool, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let updated = conn
            .interact(move |conn| {
                let now = Utc::now().naive_utc();
                diesel::update(nodes::table.filter(nodes::name.eq(&name)))
                    .set((nodes::stop_requested.eq(true), nodes::updated_at.eq(now)))
                    .execute(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(updated > 0)
    }

    /// Reads the node's stop flag. Polled by every scheduling loop.
    pub async fn stop_flag(&self, node_id: i64) -> Result<bool, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let flag = conn
            .interact(move |conn| {
                nodes::table
                    .find(node_id)
                    .select(nodes::stop_requested)
                    .get_result::<bool>(conn)
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(flag)
    }

    /// Fetches a node by id.
    pub async fn get(&self, node_id: i64) -> Result<Node, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let node = conn
            .interact(move |conn| nodes::table.find(node_id).first::<Node>(conn).optional())
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        node.ok_or(DataAccessError::NotFound {
            entity: "node",
            id: node_id.to_string(),
        })
    }

    /// Fetches a node by functional name.
    pub async fn by_name(&self, name: &str) -> Result<Option<Node>, DataAccessError> {
        let conn = self
            .dal
            .pool()
            .get()
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))?;

        let name = name.to_string();
        let node = conn
            .interact(move |conn| {
                nodes::table
                    .filter(nodes::name.eq(&name))
                    .first::<Node>(conn)
                    .optional()
            })
            .await
            .map_err(|e| DataAccessError::ConnectionPool(e.to_string()))??;

        Ok(node)
    }
}
