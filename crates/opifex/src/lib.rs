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

//! # Opifex
//!
//! An embeddable job-queue execution engine. Work is described by durable
//! job definitions, submitted as job instances onto named queues, and
//! executed by a cluster of nodes that coordinate through nothing but
//! their shared database: each node polls the queues it is bound to,
//! claims eligible instances with an atomic conditional update, runs the
//! payload and records a durable outcome.
//!
//! ## Key Features
//!
//! - Database-mediated clustering: no broker, no consensus service; a
//!   claim race is one conditional `UPDATE`
//! - Two payload kinds: C-ABI dynamic libraries invoked in-process and
//!   supervised subprocesses with captured output
//! - Priority scheduling with not-before times, per-queue concurrency
//!   ceilings and singleton (Highlander) definitions
//! - Terminal outcomes move to an immutable history table under the same
//!   id, so an instance id stays meaningful forever
//! - Deliverable files registered with SHA-256 content hashes and opaque
//!   retrieval ids
//! - Artifact dependency resolution from repository directories with a
//!   local cache
//! - PostgreSQL and SQLite behind a single connection type; backend
//!   selected at runtime from the database URL
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use opifex::{Engine, JobRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     opifex::init_logging(None);
//!
//!     let engine = Engine::builder()
//!         .database_url("sqlite://opifex.db")
//!         .node_name("worker-01")
//!         .repository_root("/srv/opifex/artifacts")
//!         .build()
//!         .await?;
//!
//!     let client = engine.client();
//!     let instance_id = client
//!         .submit(JobRequest::new("nightly-report").parameter("format", "csv"))
//!         .await?;
//!     println!("submitted instance {}", instance_id);
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! The engine seeds an empty database with a `default` queue bound to the
//! starting node, so the example above executes jobs as soon as a job
//! definition exists. Definitions, queues and bindings are managed through
//! [`Engine::dal`].

pub mod client;
pub mod dal;
pub mod database;
pub mod engine;
pub mod error;
pub mod executor;
pub mod logging;
pub mod models;
pub mod resolver;

pub use client::{Client, InstanceStatus, JobRequest};
pub use dal::{ClaimOutcome, DAL};
pub use database::{AnyConnection, BackendType, Database};
pub use engine::{Engine, EngineBuilder, EngineConfig};
pub use error::{DataAccessError, EngineError, ExecutionError, ResolveError};
pub use logging::init_logging;
pub use models::{
    Deliverable, DeploymentParameter, History, JobDef, JobInstance, JobState, Message, NewJobDef,
    Node, PayloadKind, Queue,
};
pub use resolver::{DependencyResolver, RepositoryResolver};
