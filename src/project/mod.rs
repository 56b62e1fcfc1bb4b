//! Project and service configuration.
//!
//! A project is described by a `shipper.project.toml` at its root. Services
//! live in directories matched by the project's `paths` globs, each with its
//! own `shipper.toml`. Loading walks from the given directory upwards until a
//! project file is found.

mod filter;
mod service;

pub use filter::ChangedFileFilter;
pub use service::{BuildConfig, ConfigItem, DeployConfig, SecretMount, Service};

use crate::error::{ConfigError, NotFoundError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Project configuration file name
pub const PROJECT_FILE: &str = "shipper.project.toml";

/// Service configuration file name
pub const SERVICE_FILE: &str = "shipper.toml";

fn default_trunk() -> String {
    "main".to_string()
}

/// Gitops repository settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitopsConfig {
    /// Destination repository, e.g. `github.com/acme/gitops`
    pub repo: String,
    /// Directory of rendered manifests inside the repository
    pub manifest_path: String,
    /// Directory of deploy templates inside the repository
    pub template_path: String,
    /// Kubernetes namespace written into manifests
    #[serde(default)]
    pub namespace: String,
}

/// A loaded project with its services
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    /// Project name, written into every managed manifest
    pub name: String,
    /// Source repository, e.g. `github.com/acme/platform`
    pub repo: String,
    /// Container registry prefix for deploy images
    #[serde(default)]
    pub registry_prefix: String,
    /// Trunk branch name
    #[serde(default = "default_trunk")]
    pub trunk: String,
    /// Glob patterns, relative to the project root, matching service directories
    #[serde(default)]
    pub paths: Vec<String>,
    /// Destination settings
    pub gitops: GitopsConfig,

    /// Directory the project file was found in
    #[serde(skip)]
    pub root_dir: PathBuf,
    /// Services found under `paths`, sorted by directory
    #[serde(skip)]
    pub services: Vec<Service>,
}

impl Project {
    /// Find and load the project containing `start`
    pub fn discover(start: &Path) -> Result<Self> {
        for dir in start.ancestors() {
            let conf_path = dir.join(PROJECT_FILE);
            let contents = match std::fs::read_to_string(&conf_path) {
                Ok(contents) => contents,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            log::debug!("Loading project from {}", conf_path.display());
            return Self::from_toml(&contents, dir, &conf_path);
        }

        Err(NotFoundError::ProjectConfig {
            file: PROJECT_FILE.to_string(),
            start: start.to_path_buf(),
        }
        .into())
    }

    fn from_toml(contents: &str, root: &Path, conf_path: &Path) -> Result<Self> {
        let mut project: Project = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: conf_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if project.name.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                path: conf_path.to_path_buf(),
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        project.root_dir = root.to_path_buf();
        project.services = load_services(root, &project.paths)?;
        log::debug!(
            "Project '{}' has {} service(s)",
            project.name,
            project.services.len()
        );

        Ok(project)
    }

    /// Look up a service by name
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Owner and repository name of the source repository
    pub fn source_repo(&self) -> Result<(String, String)> {
        parse_repo_locator(&self.repo)
    }
}

fn load_services(root: &Path, patterns: &[String]) -> Result<Vec<Service>> {
    let mut dirs = Vec::new();
    for pattern in patterns {
        let full = root.join(pattern);
        let entries = glob::glob(&full.to_string_lossy()).map_err(|e| ConfigError::Pattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let dir = entry.map_err(|e| ConfigError::Pattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            if dir.is_dir() {
                dirs.push(dir);
            }
        }
    }
    dirs.sort();
    dirs.dedup();

    let mut services = Vec::new();
    for dir in dirs {
        let conf_path = dir.join(SERVICE_FILE);
        let contents = match std::fs::read_to_string(&conf_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };

        let root_dir = dir
            .strip_prefix(root)
            .unwrap_or(&dir)
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");

        services.push(Service::from_toml(&contents, &conf_path, root_dir)?);
    }

    Ok(services)
}

/// Split a repository locator into owner and repository name.
///
/// Accepts `github.com/org/repo`, `https://github.com/org/repo(.git)` and
/// `git@github.com:org/repo.git`.
pub fn parse_repo_locator(locator: &str) -> Result<(String, String)> {
    let invalid = || ConfigError::Repository {
        repo: locator.to_string(),
    };

    let path = if let Some((_, path)) = locator.split_once("github.com/") {
        path
    } else if let Some((_, path)) = locator.split_once("github.com:") {
        path
    } else {
        return Err(invalid().into());
    };

    let mut parts = path.trim_end_matches('/').trim_end_matches(".git").split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(owner), Some(repo), None) if !owner.is_empty() && !repo.is_empty() => {
            Ok((owner.to_string(), repo.to_string()))
        }
        _ => Err(invalid().into()),
    }
}
