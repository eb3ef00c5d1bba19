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

//! Filesystem repository resolver.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::fs;
use tracing::debug;

use super::manifest::{ArtifactCoordinate, DependencyManifest};
use super::DependencyResolver;
use crate::error::ResolveError;

/// Resolves coordinates against ordered local repository roots.
///
/// Each root is expected to be laid out as
/// `<root>/<name>/<version>/<name>-<version>.<extension>`; the first root
/// holding an artifact wins. Hits are copied into a cache directory and
/// resolved manifests are memoized in memory, so a manifest is read and
/// walked at most once per process.
pub struct RepositoryResolver {
    repository_roots: Vec<PathBuf>,
    cache_dir: PathBuf,
    resolved: RwLock<HashMap<PathBuf, Vec<PathBuf>>>,
}

impl RepositoryResolver {
    /// Creates a resolver over `repository_roots`, caching artifacts under
    /// `cache_dir`. The cache directory is created on first use.
    pub fn new(repository_roots: Vec<PathBuf>, cache_dir: PathBuf) -> Self {
        Self {
            repository_roots,
            cache_dir,
            resolved: RwLock::new(HashMap::new()),
        }
    }

    async fn read_manifest(&self, path: &Path) -> Result<DependencyManifest, ResolveError> {
        let raw = fs::read_to_string(path)
            .await
            .map_err(|e| ResolveError::ManifestIo {
                path: path.to_path_buf(),
                source: e,
            })?;
        toml::from_str(&raw).map_err(|e| ResolveError::ManifestFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Brings one artifact into the cache and returns its cached location.
    async fn fetch(&self, coordinate: &ArtifactCoordinate) -> Result<PathBuf, ResolveError> {
        let cached = self.cache_dir.join(coordinate.file_name());
        if fs::try_exists(&cached).await? {
            debug!(artifact = %coordinate.rendered(), "Artifact already cached");
            return Ok(cached);
        }

        for root in &self.repository_roots {
            let candidate = root.join(coordinate.relative_path());
            if !fs::try_exists(&candidate).await? {
                continue;
            }

            fs::create_dir_all(&self.cache_dir).await?;
            // Stage under a unique name so a concurrent fetch of the same
            // artifact never observes a half-written cache file.
            let staging = self.cache_dir.join(format!(
                ".{}.{}",
                coordinate.file_name(),
                uuid::Uuid::new_v4().simple()
            ));
            fs::copy(&candidate, &staging).await?;
            fs::rename(&staging, &cached).await?;
            debug!(
                artifact = %coordinate.rendered(),
                from = %candidate.display(),
                "Cached artifact"
            );
            return Ok(cached);
        }

        Err(ResolveError::ArtifactUnavailable {
            name: coordinate.name.clone(),
            version: coordinate.version.clone(),
        })
    }
}

#[async_trait]
impl DependencyResolver for RepositoryResolver {
    async fn resolve(&self, manifest: &Path) -> Result<Vec<PathBuf>, ResolveError> {
        if let Some(hit) = self.resolved.read().get(manifest) {
            return Ok(hit.clone());
        }

        let parsed = self.read_manifest(manifest).await?;
        let mut artifacts = Vec::with_capacity(parsed.artifact.len());
        for coordinate in &parsed.artifact {
            coordinate.validate()?;
            if coordinate.is_provided() {
                debug!(artifact = %coordinate.rendered(), "Skipping provided artifact");
                continue;
            }
            artifacts.push(self.fetch(coordinate).await?);
        }

        self.resolved
            .write()
            .insert(manifest.to_path_buf(), artifacts.clone());
        Ok(artifacts)
    }
}
