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

//! Cluster node model.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// One engine process identity in the cluster.
///
/// A node row outlives the process: it is registered by name on first start
/// and re-used (repository paths refreshed, stop flag cleared) on every
/// subsequent start under the same name.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::nodes)]
pub struct Node {
    /// Unique identifier
    pub id: i64,
    /// Functional name, unique across the cluster
    pub name: String,
    /// Directory for per-instance stdout/stderr log files
    pub log_root: String,
    /// Directory deliverable files are copied into
    pub deliverable_root: String,
    /// Directory per-instance scratch directories are created under
    pub tmp_root: String,
    /// When set, every poller hosted by this node winds down
    pub stop_requested: bool,
    /// Liveness timestamp refreshed by the heartbeat task
    pub last_seen_alive: Option<NaiveDateTime>,
    /// Row creation timestamp
    pub created_at: NaiveDateTime,
    /// Last modification timestamp
    pub updated_at: NaiveDateTime,
}

/// Insertable form of [`Node`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::nodes)]
pub struct NewNode {
    pub name: String,
    pub log_root: String,
    pub deliverable_root: String,
    pub tmp_root: String,
    pub stop_requested: bool,
    pub last_seen_alive: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
