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

//! Error types for the engine, layered to match the crate structure.
//!
//! Each layer owns one enum: the data access layer ([`DataAccessError`]),
//! dependency resolution ([`ResolveError`]), per-job execution
//! ([`ExecutionError`]) and engine assembly ([`EngineError`]). Conversions
//! flow upward via `#[from]` so callers can use `?` across layers.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the data access layer.
#[derive(Debug, Error)]
pub enum DataAccessError {
    /// Failed to obtain a connection from the pool or to run the interact
    /// closure on it.
    #[error("Connection pool error: {0}")]
    ConnectionPool(String),

    /// A query failed inside the database.
    #[error("Database query failed: {0}")]
    Query(#[from] diesel::result::Error),

    /// Running embedded migrations failed.
    #[error("Migration failed: {0}")]
    Migration(String),

    /// The requested row does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind, e.g. "job instance"
        entity: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A conditional state change found the row in a different state than
    /// expected. Callers treat this as a lost race, not a failure.
    #[error("Conflicting state change for job instance {0}")]
    Conflict(i64),

    /// A field value failed validation before reaching the database.
    #[error("Invalid value for {field}: {reason}")]
    Invalid {
        /// Field name
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}

/// Errors raised while resolving a dependency manifest to artifact paths.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The manifest file could not be read.
    #[error("Cannot read dependency manifest {path}: {source}")]
    ManifestIo {
        /// Manifest location
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The manifest file was read but could not be parsed.
    #[error("Malformed dependency manifest {path}: {reason}")]
    ManifestFormat {
        /// Manifest location
        path: PathBuf,
        /// Parse failure detail
        reason: String,
    },

    /// An artifact coordinate inside the manifest is invalid.
    #[error("Invalid artifact coordinate '{coordinate}': {reason}")]
    Coordinate {
        /// The offending coordinate, rendered as name:version
        coordinate: String,
        /// Why it was rejected
        reason: String,
    },

    /// No configured repository holds the requested artifact.
    #[error("Artifact {name} {version} not found in any repository")]
    ArtifactUnavailable {
        /// Artifact name
        name: String,
        /// Requested version
        version: String,
    },

    /// Copying an artifact into the local cache failed.
    #[error("Artifact cache error: {0}")]
    Cache(#[from] std::io::Error),
}

/// Errors raised while executing a single job instance.
///
/// Every variant is absorbed by the loader and converted into a `crashed`
/// terminal state; none of them propagate out of the worker task.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// Dependency resolution failed before the payload could start.
    #[error("Dependency resolution failed: {0}")]
    Resolution(#[from] ResolveError),

    /// The payload library could not be loaded into the process.
    #[error("Failed to load payload library {path}: {reason}")]
    LibraryLoad {
        /// Library path
        path: PathBuf,
        /// Loader error detail
        reason: String,
    },

    /// The configured entry point symbol is missing from the library.
    #[error("Entry point '{symbol}' not found in payload library: {reason}")]
    EntryPoint {
        /// Expected exported symbol
        symbol: String,
        /// Lookup error detail
        reason: String,
    },

    /// The payload ran and reported a failure of its own.
    #[error("Payload invocation failed: {0}")]
    Invocation(String),

    /// The child process could not be spawned.
    #[error("Failed to spawn payload process {path}: {source}")]
    Spawn {
        /// Executable path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A filesystem operation needed to stage or supervise the run failed.
    #[error("Execution staging failed: {0}")]
    Staging(#[from] std::io::Error),

    /// Draining the child's output streams failed.
    #[error("Output drain failed: {0}")]
    Drain(String),

    /// The payload's produced-artifact report could not be parsed.
    #[error("Payload report is malformed: {0}")]
    Report(String),

    /// A status or history write failed.
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),
}

/// Errors raised while building or running the engine itself.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The supplied configuration was rejected.
    #[error("Invalid engine configuration: {0}")]
    Configuration(String),

    /// A database operation failed during startup or shutdown.
    #[error(transparent)]
    DataAccess(#[from] DataAccessError),

    /// The engine could not be brought up.
    #[error("Engine startup failed: {0}")]
    Startup(String),
}
