use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Build settings for a service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BuildConfig {
    /// Dockerfile path relative to the service directory
    #[serde(default)]
    pub dockerfile: String,
}

/// A named group of static configuration values
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ConfigItem {
    /// Item name, exposed as `SHIPPER_<NAME>`
    pub name: String,
    /// Hard coded values, exposed as a JSON object
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

/// A Kubernetes secret mounted into the service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecretMount {
    /// Volume name
    pub mount_name: String,
    /// Secret to mount
    pub secret_name: String,
    /// Path inside the container
    pub mount_path: String,
}

/// Deploy settings for a service
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DeployConfig {
    /// Template directory name under `<template_path>/deploy`
    pub template: String,
    /// Static configuration exposed to the template
    #[serde(default)]
    pub config: Vec<ConfigItem>,
    /// Secrets mounted into the container
    #[serde(default)]
    pub secret_mounts: Vec<SecretMount>,
}

/// A deployable unit of the project
#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    /// Service name, e.g. `service.foo`
    pub name: String,
    /// Build settings
    #[serde(default)]
    pub build: BuildConfig,
    /// Deploy settings
    pub deploy: DeployConfig,

    /// Service directory relative to the project root, `/` separated
    #[serde(skip)]
    pub root_dir: String,
}

impl Service {
    pub(super) fn from_toml(contents: &str, conf_path: &Path, root_dir: String) -> Result<Self> {
        let mut service: Service = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: conf_path.to_path_buf(),
            reason: e.to_string(),
        })?;

        if service.name.trim().is_empty() {
            return Err(ConfigError::InvalidField {
                path: conf_path.to_path_buf(),
                field: "name".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        service.root_dir = root_dir;
        Ok(service)
    }
}
