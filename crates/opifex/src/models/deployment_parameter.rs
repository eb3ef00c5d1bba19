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

//! Deployment parameter model.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// Binds a queue to a node. One poller runs per row, scanning at
/// `polling_interval_ms` and executing at most `max_concurrent` instances
/// at a time.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::deployment_parameters)]
pub struct DeploymentParameter {
    pub id: i64,
    pub node_id: i64,
    pub queue_id: i64,
    pub polling_interval_ms: i32,
    pub max_concurrent: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Insertable form of [`DeploymentParameter`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::deployment_parameters)]
pub struct NewDeploymentParameter {
    pub node_id: i64,
    pub queue_id: i64,
    pub polling_interval_ms: i32,
    pub max_concurrent: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
