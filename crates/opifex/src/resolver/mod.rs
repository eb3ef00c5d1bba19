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

//! # Dependency Resolution
//!
//! A job definition declares the artifacts its payload needs in a TOML
//! manifest. Before a payload runs, the engine turns that manifest into an
//! ordered list of local files through a [`DependencyResolver`].
//!
//! ## Key Components
//!
//! - [`DependencyResolver`]: the resolution seam. The execution context
//!   cache only sees this trait, so alternative strategies (remote
//!   repositories, pre-provisioned images) plug in without touching the
//!   executor.
//! - [`RepositoryResolver`]: the shipped implementation. Walks an ordered
//!   list of local repository roots laid out as
//!   `<root>/<name>/<version>/<name>-<version>.<extension>`, copies hits
//!   into a local artifact cache and memoizes per-manifest results.
//! - [`DependencyManifest`] / [`ArtifactCoordinate`]: the manifest format.
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use opifex::resolver::{DependencyResolver, RepositoryResolver};
//!
//! let resolver = RepositoryResolver::new(
//!     vec!["/var/lib/opifex/repository".into()],
//!     "/var/lib/opifex/artifact-cache".into(),
//! );
//!
//! let artifacts = resolver.resolve(Path::new("/etc/opifex/reporting.toml")).await?;
//! ```

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ResolveError;

pub mod manifest;
pub mod repository;

pub use manifest::{ArtifactCoordinate, DependencyManifest};
pub use repository::RepositoryResolver;

/// Turns a dependency manifest into concrete artifact locations.
///
/// Implementations must be shareable across pollers; resolution for the
/// same manifest may be requested concurrently and should be cheap on
/// repeat calls.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Resolves every coordinate in `manifest` to a local file, preserving
    /// manifest order.
    async fn resolve(&self, manifest: &Path) -> Result<Vec<PathBuf>, ResolveError>;
}
