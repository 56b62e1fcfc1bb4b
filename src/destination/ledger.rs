//! Deployed-state ledger reconstructed from gitops manifests.
//!
//! The ledger is never stored on its own. Each read rebuilds it from the
//! annotated manifests in the destination repository, so the repository stays
//! the single source of truth.

use crate::error::{LedgerError, Result, ValidationError};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Positive deploy version, written as `v<N>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Version {
    /// First version of any service
    pub const FIRST: Version = Version(1);

    /// `None` for zero
    pub fn new(n: u32) -> Option<Self> {
        (n > 0).then_some(Self(n))
    }

    /// Numeric value
    pub fn get(self) -> u32 {
        self.0
    }

    /// The version after this one, `None` past `u32::MAX`
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl FromStr for Version {
    type Err = crate::error::ShipperError;

    /// Accepts `v7`, `V7` and `7`
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        digits
            .parse::<u32>()
            .ok()
            .and_then(Version::new)
            .ok_or_else(|| {
                ValidationError::InvalidParameter {
                    parameter: "version".to_string(),
                    reason: format!("'{s}' is not a positive version like v3"),
                }
                .into()
            })
    }
}

/// A manifest document that belongs to a deploy bundle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// File the document was read from
    pub path: PathBuf,
    /// Kubernetes kind
    pub kind: String,
    /// `metadata.name`
    pub name: String,
}

/// One deployed version of a service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deploy {
    /// Version
    pub version: Version,
    /// Documents making up the bundle
    pub artifacts: Vec<Artifact>,
}

/// Ledger of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationService {
    /// Project name
    pub project: String,
    /// Service name
    pub name: String,
    /// Deploys in ascending version order
    pub deploys: Vec<Deploy>,
    /// Version receiving traffic, always one of `deploys`
    pub release: Option<Version>,
}

impl DestinationService {
    /// Empty ledger
    pub fn new(project: &str, name: &str) -> Self {
        Self {
            project: project.to_string(),
            name: name.to_string(),
            deploys: Vec::new(),
            release: None,
        }
    }

    /// Whether `version` has a deploy bundle
    pub fn has_version(&self, version: Version) -> bool {
        self.deploys.iter().any(|d| d.version == version)
    }

    /// Highest deployed version
    pub fn latest(&self) -> Option<Version> {
        self.deploys.iter().map(|d| d.version).max()
    }

    /// Highest deployed version, or 0 without deploys
    pub fn current_version(&self) -> u32 {
        self.latest().map_or(0, Version::get)
    }

    /// Version the next deploy must use
    pub fn next_version(&self) -> Result<Version> {
        match self.latest() {
            None => Ok(Version::FIRST),
            Some(latest) => latest.next().ok_or_else(|| {
                LedgerError::VersionsExhausted {
                    service: self.name.clone(),
                    latest: latest.to_string(),
                }
                .into()
            }),
        }
    }
}

/// Ledger of every service in a project
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationState {
    /// Project name
    pub project: String,
    /// Services keyed by name
    pub services: BTreeMap<String, DestinationService>,
}

impl DestinationState {
    /// Empty ledger for `project`
    pub fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            services: BTreeMap::new(),
        }
    }

    /// Look up a service
    pub fn service(&self, name: &str) -> Option<&DestinationService> {
        self.services.get(name)
    }

    /// Next version for `name`, 1 for unknown services
    pub fn next_version_for(&self, name: &str) -> Result<Version> {
        self.service(name)
            .map_or(Ok(Version::FIRST), DestinationService::next_version)
    }

    /// Current version for `name`, 0 for unknown services
    pub fn current_version_for(&self, name: &str) -> u32 {
        self.service(name)
            .map_or(0, DestinationService::current_version)
    }

    fn service_mut(&mut self, name: &str) -> &mut DestinationService {
        let project = self.project.clone();
        self.services
            .entry(name.to_string())
            .or_insert_with(|| DestinationService::new(&project, name))
    }

    /// Add a deploy bundle member, merging with an existing record for the
    /// same version
    pub fn record_deploy(&mut self, service: &str, version: Version, artifact: Artifact) {
        let svc = self.service_mut(service);
        match svc.deploys.iter_mut().find(|d| d.version == version) {
            Some(deploy) => deploy.artifacts.push(artifact),
            None => svc.deploys.push(Deploy {
                version,
                artifacts: vec![artifact],
            }),
        }
    }

    /// Point the service's release at `version`; later calls win
    pub fn record_release(&mut self, service: &str, version: Version) {
        self.service_mut(service).release = Some(version);
    }

    /// Sort deploys numerically and drop release pointers with no deploy
    pub fn finish(mut self) -> Self {
        for svc in self.services.values_mut() {
            svc.deploys.sort_by_key(|d| d.version);
            if let Some(release) = svc.release
                && !svc.has_version(release)
            {
                log::warn!(
                    "{}: release points at {release} which has no deploy bundle, ignoring",
                    svc.name
                );
                svc.release = None;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(n: u32) -> Version {
        Version::new(n).unwrap()
    }

    fn artifact(name: &str) -> Artifact {
        Artifact {
            path: PathBuf::from(format!("{name}.yaml")),
            kind: "Deployment".to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn parses_and_displays_versions() {
        assert_eq!("v7".parse::<Version>().unwrap(), v(7));
        assert_eq!("12".parse::<Version>().unwrap(), v(12));
        assert_eq!(v(3).to_string(), "v3");
        assert!("v0".parse::<Version>().is_err());
        assert!("latest".parse::<Version>().is_err());
        assert!("".parse::<Version>().is_err());
    }

    #[test]
    fn versions_order_numerically() {
        assert!(v(9) < v(10));
        let mut state = DestinationState::new("acme");
        for n in [10, 2, 9, 1] {
            state.record_deploy("service.a", v(n), artifact("a"));
        }
        let state = state.finish();
        let svc = state.service("service.a").unwrap();
        let order: Vec<u32> = svc.deploys.iter().map(|d| d.version.get()).collect();
        assert_eq!(order, vec![1, 2, 9, 10]);
        assert_eq!(svc.current_version(), 10);
        assert_eq!(svc.next_version().unwrap(), v(11));
    }

    #[test]
    fn empty_service_starts_at_one() {
        let state = DestinationState::new("acme");
        assert_eq!(state.next_version_for("service.new").unwrap(), Version::FIRST);
        assert_eq!(state.current_version_for("service.new"), 0);
    }

    #[test]
    fn next_version_stops_at_the_last_representable_one() {
        assert_eq!(v(u32::MAX).next(), None);
        let mut state = DestinationState::new("acme");
        state.record_deploy("service.a", v(u32::MAX), artifact("a"));
        let state = state.finish();
        let err = state.next_version_for("service.a").unwrap_err();
        assert!(matches!(
            err,
            crate::error::ShipperError::Ledger(LedgerError::VersionsExhausted { .. })
        ));
    }

    #[test]
    fn artifacts_of_one_version_aggregate() {
        let mut state = DestinationState::new("acme");
        state.record_deploy("service.a", v(1), artifact("deployment"));
        state.record_deploy("service.a", v(1), artifact("configmap"));
        let state = state.finish();
        let svc = state.service("service.a").unwrap();
        assert_eq!(svc.deploys.len(), 1);
        assert_eq!(svc.deploys[0].artifacts.len(), 2);
    }

    #[test]
    fn dangling_release_is_dropped() {
        let mut state = DestinationState::new("acme");
        state.record_deploy("service.a", v(1), artifact("a"));
        state.record_release("service.a", v(4));
        let state = state.finish();
        assert_eq!(state.service("service.a").unwrap().release, None);
    }
}
