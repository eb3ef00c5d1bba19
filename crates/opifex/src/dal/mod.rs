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

//! Data access layer with runtime backend selection.
//!
//! Queries are written once against [`AnyConnection`](crate::database::AnyConnection)
//! and run unchanged on PostgreSQL and SQLite. The only places that drop
//! down to a concrete connection are inserts that return the generated id
//! and the attribution claim, whose locking differs per backend.
//!
//! # Example
//!
//! ```rust,ignore
//! use opifex::dal::DAL;
//! use opifex::database::Database;
//!
//! let db = Database::new("postgres://localhost/opifex", "opifex", 10);
//! let dal = DAL::new(db);
//!
//! let instance = dal.job_instance().get(42).await?;
//! ```

use crate::database::{BackendType, Database, DbPool};

pub mod attribution;
pub mod deliverable;
pub mod deployment_parameter;
pub mod history;
pub mod job_def;
pub mod job_instance;
pub mod message;
pub mod node;
pub mod queue;

pub use attribution::{AttributionDAL, ClaimOutcome};
pub use deliverable::DeliverableDAL;
pub use deployment_parameter::DeploymentParameterDAL;
pub use history::HistoryDAL;
pub use job_def::JobDefDAL;
pub use job_instance::JobInstanceDAL;
pub use message::MessageDAL;
pub use node::NodeDAL;
pub use queue::QueueDAL;

/// Helper macro for matching on AnyConnection variants.
///
/// This macro simplifies pattern matching on connection types when
/// executing backend-specific queries.
///
/// # Example
///
/// ```rust,ignore
/// connection_match!(conn, pg_conn => {
///     // Use pg_conn for PostgreSQL operations
///     diesel::select(1).get_result::<i32>(pg_conn)
/// }, sqlite_conn => {
///     // Use sqlite_conn for SQLite operations
///     diesel::select(1).get_result::<i32>(sqlite_conn)
/// })
/// ```
#[macro_export]
macro_rules! connection_match {
    ($conn:expr, $pg_var:ident => $pg_block:block, $sqlite_var:ident => $sqlite_block:block) => {
        match $conn {
            #[cfg(feature = "postgres")]
            $crate::database::AnyConnection::Postgres($pg_var) => $pg_block,
            #[cfg(feature = "sqlite")]
            $crate::database::AnyConnection::Sqlite($sqlite_var) => $sqlite_block,
        }
    };
}

/// The Data Access Layer facade.
///
/// Provides access to all database operations through per-entity accessors.
///
/// # Thread Safety
///
/// The `DAL` struct is `Clone` and can be safely shared between tasks.
/// Each clone references the same underlying connection pool.
#[derive(Clone, Debug)]
pub struct DAL {
    /// The database instance with connection pool
    pub database: Database,
}

impl DAL {
    /// Creates a new DAL instance.
    ///
    /// # Arguments
    ///
    /// * `database` - A Database instance configured for either PostgreSQL
    ///   or SQLite
    pub fn new(database: Database) -> Self {
        DAL { database }
    }

    /// Returns the backend type for this DAL instance.
    pub fn backend(&self) -> BackendType {
        self.database.backend()
    }

    /// Returns a reference to the underlying database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Returns the connection pool.
    pub fn pool(&self) -> DbPool {
        self.database.pool()
    }

    /// Returns a node DAL for cluster membership operations.
    pub fn node(&self) -> NodeDAL {
        NodeDAL::new(self)
    }

    /// Returns a queue DAL for queue operations.
    pub fn queue(&self) -> QueueDAL {
        QueueDAL::new(self)
    }

    /// Returns a job definition DAL.
    pub fn job_def(&self) -> JobDefDAL {
        JobDefDAL::new(self)
    }

    /// Returns a deployment parameter DAL for queue-to-node bindings.
    pub fn deployment_parameter(&self) -> DeploymentParameterDAL {
        DeploymentParameterDAL::new(self)
    }

    /// Returns a job instance DAL for live instance operations.
    pub fn job_instance(&self) -> JobInstanceDAL {
        JobInstanceDAL::new(self)
    }

    /// Returns the attribution DAL, the cluster-wide claim point.
    pub fn attribution(&self) -> AttributionDAL {
        AttributionDAL::new(self)
    }

    /// Returns a history DAL for terminal outcome records.
    pub fn history(&self) -> HistoryDAL {
        HistoryDAL::new(self)
    }

    /// Returns a deliverable DAL for produced artifacts.
    pub fn deliverable(&self) -> DeliverableDAL {
        DeliverableDAL::new(self)
    }

    /// Returns a message DAL for instance notes.
    pub fn message(&self) -> MessageDAL {
        MessageDAL::new(self)
    }
}
