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

//! Shared types for the execution pipeline.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::OwnedSemaphorePermit;
use tracing::debug;

use crate::models::{JobDef, JobInstance};

/// A claimed instance paired with its definition, handed from the poller
/// to a loader.
#[derive(Debug, Clone)]
pub struct ClaimedInstance {
    /// The instance, as read before the claim
    pub instance: JobInstance,
    /// Its definition
    pub job_def: JobDef,
}

/// What the engine passes to a payload's entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayloadRequest {
    /// Id of the instance being executed
    pub job_instance_id: i64,
    /// Application name of the definition
    pub application_name: String,
    /// Effective parameters: definition defaults with instance overrides
    /// applied on top
    pub parameters: BTreeMap<String, String>,
}

/// One produced artifact, as reported by a payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliverableDescriptor {
    /// Where the payload wrote the file
    pub path: PathBuf,
    /// The name the file should be retrieved under
    pub name: String,
    /// Optional grouping tag
    #[serde(default)]
    pub family: Option<String>,
}

/// What a library payload hands back through the response buffer.
///
/// Subprocess payloads report the same descriptors through their report
/// file instead, one JSON object per line.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadReport {
    /// Mirror of the entry point's return code
    #[serde(default)]
    pub return_code: i32,
    /// Artifacts the payload produced
    #[serde(default)]
    pub deliverables: Vec<DeliverableDescriptor>,
    /// Free-text notes to attach to the instance
    #[serde(default)]
    pub notes: Vec<String>,
}

/// One unit of pool capacity, held for the life of a loader task.
///
/// The permit is released when the slot drops, so capacity comes back on
/// every exit path without the loader having to remember to return it.
pub struct ExecutionSlot {
    queue_name: String,
    _permit: OwnedSemaphorePermit,
}

impl ExecutionSlot {
    /// Wraps an acquired permit for the named queue.
    pub fn new(queue_name: String, permit: OwnedSemaphorePermit) -> Self {
        Self {
            queue_name,
            _permit: permit,
        }
    }
}

impl Drop for ExecutionSlot {
    fn drop(&mut self) {
        debug!(queue = %self.queue_name, "Execution slot released");
    }
}
