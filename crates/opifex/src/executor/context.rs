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

//! Execution contexts and their cache.
//!
//! Building a context can be expensive: it resolves the definition's
//! dependency manifest and, for library payloads, loads the payload into
//! the process. The cache makes that cost once-per-application: concurrent
//! loaders asking for the same application identity share one build, with
//! the losers of the race awaiting the winner's cell instead of resolving
//! again.
//!
//! The cache is unbounded. Its size is bounded in practice by the number
//! of distinct enabled job definitions an installation runs, which is
//! small and stable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use libloading::Library;
use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::info;

use crate::error::ExecutionError;
use crate::models::{JobDef, PayloadKind};
use crate::resolver::DependencyResolver;

/// A built, reusable execution environment for one application identity.
///
/// Holds the resolved artifact set and, for library payloads, the loaded
/// library. The library stays loaded for as long as the context is cached,
/// which keeps its symbols valid for every run that shares it.
pub struct ExecutionContext {
    application_name: String,
    artifacts: Vec<PathBuf>,
    library: Option<Library>,
}

impl ExecutionContext {
    /// The application identity this context was built for.
    pub fn application_name(&self) -> &str {
        &self.application_name
    }

    /// Resolved artifact locations, in manifest order.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.artifacts
    }

    /// The loaded payload library, present for library payloads only.
    pub fn library(&self) -> Option<&Library> {
        self.library.as_ref()
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("application_name", &self.application_name)
            .field("artifacts", &self.artifacts)
            .field("library", &self.library.is_some())
            .finish()
    }
}

/// Shares execution contexts between all loaders on a node.
///
/// Keyed by application name. Each key gets one single-flight cell, so an
/// application identity is resolved at most once even when many loaders
/// hit a cold cache at the same moment. A failed build leaves the cell
/// empty, so the next run retries instead of caching the failure.
pub struct ContextCache {
    resolver: Arc<dyn DependencyResolver>,
    contexts: RwLock<HashMap<String, Arc<OnceCell<Arc<ExecutionContext>>>>>,
}

impl ContextCache {
    /// Creates an empty cache resolving manifests through `resolver`.
    pub fn new(resolver: Arc<dyn DependencyResolver>) -> Self {
        Self {
            resolver,
            contexts: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the context for `job_def`'s application, building it if this
    /// is the first use.
    pub async fn get_or_build(
        &self,
        job_def: &JobDef,
    ) -> Result<Arc<ExecutionContext>, ExecutionError> {
        let cell = self.cell_for(&job_def.application_name);
        let context = cell
            .get_or_try_init(|| async { self.build(job_def).await.map(Arc::new) })
            .await?;
        Ok(context.clone())
    }

    /// Number of successfully built contexts currently cached.
    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// True when nothing has been cached yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell_for(&self, application_name: &str) -> Arc<OnceCell<Arc<ExecutionContext>>> {
        if let Some(cell) = self.contexts.read().get(application_name) {
            return cell.clone();
        }
        self.contexts
            .write()
            .entry(application_name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn build(&self, job_def: &JobDef) -> Result<ExecutionContext, ExecutionError> {
        let artifacts = match &job_def.manifest_path {
            Some(path) => self.resolver.resolve(Path::new(path)).await?,
            None => Vec::new(),
        };

        let library = match job_def.kind() {
            Some(PayloadKind::Library) => {
                Some(load_library(Path::new(&job_def.payload_path))?)
            }
            _ => None,
        };

        info!(
            application = %job_def.application_name,
            artifacts = artifacts.len(),
            library = library.is_some(),
            "Built execution context"
        );

        Ok(ExecutionContext {
            application_name: job_def.application_name.clone(),
            artifacts,
            library,
        })
    }
}

fn load_library(path: &Path) -> Result<Library, ExecutionError> {
    unsafe { Library::new(path) }.map_err(|e| ExecutionError::LibraryLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
