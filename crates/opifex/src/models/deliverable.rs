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

//! Deliverable model.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// A file artifact produced by a payload run, immutable once registered.
///
/// Retrieval goes through `random_id`, an opaque UUID unrelated to the
/// owning instance id, so handing out a download link does not leak
/// instance numbering.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::deliverables)]
pub struct Deliverable {
    pub id: i64,
    /// Instance that produced the file
    pub job_instance_id: i64,
    /// Stored location under the node's deliverable repository
    pub path: String,
    /// File name the payload gave the artifact
    pub original_name: String,
    /// Freeform grouping tag
    pub family: Option<String>,
    /// SHA-256 of the stored file, hex encoded
    pub content_hash: String,
    /// Opaque retrieval id
    pub random_id: String,
    pub created_at: NaiveDateTime,
}

/// Insertable form of [`Deliverable`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::deliverables)]
pub struct NewDeliverable {
    pub job_instance_id: i64,
    pub path: String,
    pub original_name: String,
    pub family: Option<String>,
    pub content_hash: String,
    pub random_id: String,
    pub created_at: NaiveDateTime,
}
