//! Reading the ledger out of annotated Kubernetes manifests.
//!
//! Managed documents carry `shipper/*` annotations in `metadata.annotations`.
//! Each document is parsed into a typed [`LedgerEntry`]; documents that do not
//! claim a bundle are unmanaged and ignored, documents that claim one but are
//! incomplete are skipped with a warning.

use super::ledger::{Artifact, DestinationState, Version};
use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// `deploy` or `release`
pub const BUNDLE_ANNOTATION: &str = "shipper/bundle";
/// Owning project
pub const PROJECT_ANNOTATION: &str = "shipper/project";
/// Owning service
pub const SERVICE_ANNOTATION: &str = "shipper/service-name";
/// Version of a deploy bundle member
pub const DEPLOY_VERSION_ANNOTATION: &str = "shipper/deploy-version";
/// Active version carried by the release bundle
pub const RELEASE_VERSION_ANNOTATION: &str = "shipper/current-release";

/// A managed manifest document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// Member of a deploy bundle
    Deploy {
        /// Project name
        project: String,
        /// Service name
        service: String,
        /// Deployed version
        version: Version,
    },
    /// The service's release document
    Release {
        /// Project name
        project: String,
        /// Service name
        service: String,
        /// Active version
        version: Version,
    },
}

impl LedgerEntry {
    /// Project the entry belongs to
    pub fn project(&self) -> &str {
        match self {
            LedgerEntry::Deploy { project, .. } | LedgerEntry::Release { project, .. } => project,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Metadata {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    annotations: Option<BTreeMap<String, serde_yaml::Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct Document {
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    metadata: Option<Metadata>,
}

fn scalar(value: &serde_yaml::Value) -> Option<String> {
    match value {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Turn an annotation set into a ledger entry.
///
/// `Ok(None)` means the document is not managed. `Err` carries the reason a
/// managed document was rejected.
pub fn parse_entry(
    annotations: &BTreeMap<String, String>,
) -> std::result::Result<Option<LedgerEntry>, String> {
    let Some(bundle) = annotations.get(BUNDLE_ANNOTATION) else {
        return Ok(None);
    };

    let required = |key: &str| -> std::result::Result<String, String> {
        annotations
            .get(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| format!("missing {key}"))
    };
    let version = |key: &str| -> std::result::Result<Version, String> {
        let raw = required(key)?;
        raw.parse::<Version>()
            .map_err(|_| format!("{key} '{raw}' is not a version"))
    };

    let project = required(PROJECT_ANNOTATION)?;
    let service = required(SERVICE_ANNOTATION)?;

    match bundle.trim() {
        "deploy" => Ok(Some(LedgerEntry::Deploy {
            project,
            service,
            version: version(DEPLOY_VERSION_ANNOTATION)?,
        })),
        "release" => Ok(Some(LedgerEntry::Release {
            project,
            service,
            version: version(RELEASE_VERSION_ANNOTATION)?,
        })),
        other => Err(format!("unknown bundle kind '{other}'")),
    }
}

/// Managed entries of every document in one file
pub fn read_file(path: &Path) -> Result<Vec<(LedgerEntry, Artifact)>> {
    let unreadable = |reason: String| LedgerError::UnreadableArtifact {
        path: path.to_path_buf(),
        reason,
    };

    let contents = std::fs::read_to_string(path).map_err(|e| unreadable(e.to_string()))?;
    let mut out = Vec::new();

    for (index, de) in serde_yaml::Deserializer::from_str(&contents).enumerate() {
        let value = serde_yaml::Value::deserialize(de).map_err(|e| unreadable(e.to_string()))?;
        if value.is_null() {
            continue;
        }

        let document: Document = match serde_yaml::from_value(value) {
            Ok(document) => document,
            Err(e) => {
                log::warn!("{} document {index}: not a manifest, skipping: {e}", path.display());
                continue;
            }
        };

        let metadata = document.metadata.unwrap_or_default();
        let annotations: BTreeMap<String, String> = metadata
            .annotations
            .unwrap_or_default()
            .iter()
            .filter_map(|(k, v)| scalar(v).map(|v| (k.clone(), v)))
            .collect();

        match parse_entry(&annotations) {
            Ok(Some(entry)) => out.push((
                entry,
                Artifact {
                    path: path.to_path_buf(),
                    kind: document.kind.unwrap_or_default(),
                    name: metadata.name.unwrap_or_default(),
                },
            )),
            Ok(None) => {}
            Err(reason) => {
                log::warn!("{} document {index}: skipping managed manifest: {reason}", path.display());
            }
        }
    }

    Ok(out)
}

/// YAML files under `root` in sorted path order
pub fn manifest_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| LedgerError::UnreadableArtifact {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf()),
            reason: e.to_string(),
        })?;
        let is_yaml = entry
            .path()
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if entry.file_type().is_file() && is_yaml {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Rebuild the ledger of `project` from the manifests under `root`.
///
/// A missing root is an empty ledger, not an error: nothing has been deployed.
pub fn read_ledger(root: &Path, project: &str) -> Result<DestinationState> {
    let mut state = DestinationState::new(project);
    if !root.exists() {
        log::debug!("Manifest root {} does not exist yet", root.display());
        return Ok(state);
    }

    for file in manifest_files(root)? {
        for (entry, artifact) in read_file(&file)? {
            if entry.project() != project {
                continue;
            }
            match entry {
                LedgerEntry::Deploy {
                    service, version, ..
                } => state.record_deploy(&service, version, artifact),
                LedgerEntry::Release {
                    service, version, ..
                } => state.record_release(&service, version),
            }
        }
    }

    Ok(state.finish())
}
