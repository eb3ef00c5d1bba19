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

//! Dependency manifest format.
//!
//! A manifest is a TOML file with an `[[artifact]]` array:
//!
//! ```toml
//! [[artifact]]
//! name = "csv-writer"
//! version = "1.4.0"
//!
//! [[artifact]]
//! name = "branding-assets"
//! version = "2.0.1"
//! extension = "tar"
//! scope = "runtime"
//! ```

use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::ResolveError;

/// Artifact names follow crate-name rules: lowercase alphanumerics,
/// hyphen and underscore, starting with an alphanumeric.
static ARTIFACT_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("Failed to compile regex"));

/// Extension used when a coordinate does not declare one.
const DEFAULT_EXTENSION: &str = "so";

/// Scope value for artifacts the runtime environment already provides.
/// Such coordinates are validated but never resolved.
const PROVIDED_SCOPE: &str = "provided";

/// A parsed dependency manifest.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DependencyManifest {
    /// Declared artifacts, in resolution order.
    #[serde(default)]
    pub artifact: Vec<ArtifactCoordinate>,
}

/// One artifact coordinate: what to fetch and where it sits inside a
/// repository tree.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ArtifactCoordinate {
    /// Artifact name
    pub name: String,
    /// Exact semantic version
    pub version: String,
    /// Optional scope; `provided` artifacts are skipped during resolution
    #[serde(default)]
    pub scope: Option<String>,
    /// File extension inside the repository, `so` when absent
    #[serde(default)]
    pub extension: Option<String>,
}

impl ArtifactCoordinate {
    /// Validates the coordinate, returning the parsed version.
    pub fn validate(&self) -> Result<Version, ResolveError> {
        if !ARTIFACT_NAME.is_match(&self.name) {
            return Err(ResolveError::Coordinate {
                coordinate: self.rendered(),
                reason: "name must be lowercase alphanumeric with '-' or '_'".to_string(),
            });
        }
        Version::parse(&self.version).map_err(|e| ResolveError::Coordinate {
            coordinate: self.rendered(),
            reason: format!("version is not a semantic version: {}", e),
        })
    }

    /// True when the runtime provides this artifact and resolution should
    /// skip it.
    pub fn is_provided(&self) -> bool {
        self.scope.as_deref() == Some(PROVIDED_SCOPE)
    }

    /// The artifact's file name: `<name>-<version>.<extension>`.
    pub fn file_name(&self) -> String {
        format!("{}-{}.{}", self.name, self.version, self.extension_or_default())
    }

    /// The artifact's location relative to a repository root:
    /// `<name>/<version>/<name>-<version>.<extension>`.
    pub fn relative_path(&self) -> PathBuf {
        PathBuf::from(&self.name)
            .join(&self.version)
            .join(self.file_name())
    }

    /// The coordinate rendered for error messages, `name:version`.
    pub fn rendered(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    fn extension_or_default(&self) -> &str {
        self.extension.as_deref().unwrap_or(DEFAULT_EXTENSION)
    }
}
