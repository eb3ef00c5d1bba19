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

//! Job definition model.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

/// How a payload is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    /// A dynamic library loaded into the engine process; the entry point is
    /// an exported C-ABI symbol
    Library,
    /// An external program run as a child process; the exit code is the
    /// return code
    Subprocess,
}

impl PayloadKind {
    /// The database representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Library => "library",
            PayloadKind::Subprocess => "subprocess",
        }
    }

    /// Parses a database value back into a kind.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "library" => Some(PayloadKind::Library),
            "subprocess" => Some(PayloadKind::Subprocess),
            _ => None,
        }
    }
}

/// A payload definition: what to run, where its code and dependencies live,
/// and how instances of it are classified.
///
/// Immutable during a run. Job instances reference it, never mutate it.
#[derive(Debug, Clone, Queryable, Serialize, Deserialize)]
#[diesel(table_name = crate::database::schema::job_defs)]
pub struct JobDef {
    /// Unique identifier
    pub id: i64,
    /// Application name, the unique functional key clients submit against
    pub application_name: String,
    /// Payload kind, see [`PayloadKind`]
    pub payload_kind: String,
    /// Library file or executable path
    pub payload_path: String,
    /// Exported symbol name for library payloads; unused for subprocesses
    pub entry_point: String,
    /// Dependency manifest location; `None` means the payload has no
    /// declared dependencies
    pub manifest_path: Option<String>,
    /// Default target queue for instances of this definition
    pub queue_id: i64,
    /// At most one instance attributed or running cluster-wide when set
    pub highlander: bool,
    /// Disabled definitions reject new submissions
    pub enabled: bool,
    /// Classification: owning application
    pub application: Option<String>,
    /// Classification: module
    pub module: Option<String>,
    /// Classification keyword
    pub keyword1: Option<String>,
    /// Classification keyword
    pub keyword2: Option<String>,
    /// Classification keyword
    pub keyword3: Option<String>,
    /// Default parameters as a JSON object of string values
    pub default_parameters: String,
    /// Row creation timestamp
    pub created_at: NaiveDateTime,
    /// Last modification timestamp
    pub updated_at: NaiveDateTime,
}

impl JobDef {
    /// The parsed payload kind, `None` if the stored value is unknown.
    pub fn kind(&self) -> Option<PayloadKind> {
        PayloadKind::parse(&self.payload_kind)
    }

    /// Parses the default parameter map. Malformed JSON yields an empty map
    /// rather than an error; the definition author sees a warning at
    /// submission time instead.
    pub fn default_parameter_map(&self) -> BTreeMap<String, String> {
        serde_json::from_str(&self.default_parameters).unwrap_or_default()
    }
}

/// Insertable form of [`JobDef`].
#[derive(Debug, Insertable)]
#[diesel(table_name = crate::database::schema::job_defs)]
pub struct NewJobDef {
    pub application_name: String,
    pub payload_kind: String,
    pub payload_path: String,
    pub entry_point: String,
    pub manifest_path: Option<String>,
    pub queue_id: i64,
    pub highlander: bool,
    pub enabled: bool,
    pub application: Option<String>,
    pub module: Option<String>,
    pub keyword1: Option<String>,
    pub keyword2: Option<String>,
    pub keyword3: Option<String>,
    pub default_parameters: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}
