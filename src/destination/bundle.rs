//! Rendering deploy and release bundles into the gitops tree.
//!
//! Layout under the manifest root:
//!
//! ```text
//! <service>/service.yaml        release bundle
//! <service>/v<N>/*.yaml         deploy bundle for version N
//! ```
//!
//! Deploy bundles are rendered from `<template_root>/deploy/<template>/*.yaml`
//! with handlebars. The release bundle uses a built-in template.

use super::ledger::Version;
use super::manifest::{LedgerEntry, read_file};
use crate::error::{BundleError, ConflictError, NotFoundError, Result};
use crate::project::{ConfigItem, SecretMount};
use handlebars::{Handlebars, handlebars_helper};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the release bundle inside a service directory
pub const RELEASE_FILE: &str = "service.yaml";

const RELEASE_TEMPLATE: &str = r#"kind: Service
apiVersion: v1
metadata:
  name: {{slug_name}}
  namespace: {{namespace}}
  annotations:
    shipper/bundle: release
    shipper/project: {{json project}}
    shipper/service-name: {{json name}}
    shipper/current-release: {{version}}
spec:
  ports:
    - name: http
      port: 8000
  selector:
    app: {{slug_name}}
    version: {{version}}
"#;

handlebars_helper!(json: |value: Json| serde_json::to_string(value).unwrap_or_default());

/// Values available to deploy templates
#[derive(Debug, Clone, Serialize)]
pub struct DeployContext {
    /// Project name
    pub project: String,
    /// Service name, e.g. `service.foo`
    pub name: String,
    /// Resource name, e.g. `s-foo`
    pub slug_name: String,
    /// Version, e.g. `v3`
    pub version: String,
    /// Versioned resource name, e.g. `s-foo-v3`
    pub slug_name_version: String,
    /// Image to run, e.g. `gcr.io/acme/service.foo:0123abc`
    pub deploy_image: String,
    /// Kubernetes namespace
    pub namespace: String,
    /// `SHIPPER_<NAME>` to JSON encoded values
    pub deploy_variables: BTreeMap<String, String>,
    /// Secrets mounted into the container
    pub secret_mounts: Vec<SecretMount>,
}

/// Values available to the release template
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseContext {
    /// Project name
    pub project: String,
    /// Service name
    pub name: String,
    /// Resource name
    pub slug_name: String,
    /// Version to route traffic to
    pub version: String,
    /// Versioned resource name of the target deploy
    pub slug_name_version: String,
    /// Kubernetes namespace
    pub namespace: String,
}

/// `SHIPPER_<NAME>` environment values for a service's static config
pub fn deploy_variables(config: &[ConfigItem]) -> Result<BTreeMap<String, String>> {
    let mut out = BTreeMap::new();
    for item in config {
        let key = format!("SHIPPER_{}", item.name.to_uppercase());
        out.insert(key, serde_json::to_string(&item.values)?);
    }
    Ok(out)
}

fn renderer() -> Handlebars<'static> {
    let mut hb = Handlebars::new();
    hb.register_escape_fn(handlebars::no_escape);
    hb.set_strict_mode(true);
    hb.register_helper("json", Box::new(json));
    hb
}

fn render(hb: &mut Handlebars<'static>, name: &str, source: &str, data: &impl Serialize) -> Result<String> {
    let render_err = |reason: String| BundleError::Render {
        template: name.to_string(),
        reason,
    };
    hb.register_template_string(name, source)
        .map_err(|e| render_err(e.to_string()))?;
    Ok(hb.render(name, data).map_err(|e| render_err(e.to_string()))?)
}

fn template_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(NotFoundError::Template {
            path: dir.to_path_buf(),
        }
        .into());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_yaml = path
            .extension()
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        if path.is_file() && is_yaml {
            files.push(path);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(NotFoundError::Template {
            path: dir.to_path_buf(),
        }
        .into());
    }
    Ok(files)
}

/// Directory holding the deploy bundle for `service` at `version`
pub fn deploy_dir(manifest_root: &Path, service: &str, version: Version) -> PathBuf {
    manifest_root.join(service).join(version.to_string())
}

/// Render `template` into a new deploy bundle and return the written files.
///
/// Every rendered file must carry the deploy annotations for this exact
/// project, service and version, otherwise the deploy would be invisible to
/// the ledger.
pub fn write_deploy_bundle(
    template_root: &Path,
    manifest_root: &Path,
    template: &str,
    version: Version,
    ctx: &DeployContext,
) -> Result<Vec<PathBuf>> {
    let templates = template_files(&template_root.join("deploy").join(template))?;

    let out_dir = deploy_dir(manifest_root, &ctx.name, version);
    if out_dir.exists() {
        return Err(ConflictError::VersionExists {
            service: ctx.name.clone(),
            version: version.to_string(),
        }
        .into());
    }
    std::fs::create_dir_all(&out_dir)?;

    let mut hb = renderer();
    let mut written = Vec::new();
    for template_path in templates {
        let file_name = template_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = std::fs::read_to_string(&template_path)?;
        let rendered = render(&mut hb, &file_name, &source, ctx)?;

        let out_path = out_dir.join(&file_name);
        std::fs::write(&out_path, rendered)?;

        let entries = read_file(&out_path)?;
        let matches = |entry: &LedgerEntry| {
            matches!(entry, LedgerEntry::Deploy { project, service, version: v }
                if *project == ctx.project && *service == ctx.name && *v == version)
        };
        if entries.is_empty() || !entries.iter().all(|(entry, _)| matches(entry)) {
            return Err(BundleError::MissingAnnotations {
                template: format!("{template}/{file_name}"),
                service: ctx.name.clone(),
                version: version.to_string(),
            }
            .into());
        }

        log::debug!("Wrote {}", out_path.display());
        written.push(out_path);
    }

    Ok(written)
}

/// Write the release bundle pointing traffic at `ctx.version`
pub fn write_release_bundle(manifest_root: &Path, ctx: &ReleaseContext) -> Result<PathBuf> {
    let service_dir = manifest_root.join(&ctx.name);
    std::fs::create_dir_all(&service_dir)?;

    let rendered = render(&mut renderer(), RELEASE_FILE, RELEASE_TEMPLATE, ctx)?;
    let path = service_dir.join(RELEASE_FILE);
    std::fs::write(&path, rendered)?;
    Ok(path)
}

/// Delete the deploy bundle for `service` at `version`
pub fn delete_deploy_bundle(manifest_root: &Path, service: &str, version: Version) -> Result<()> {
    let dir = deploy_dir(manifest_root, service, version);
    if !dir.is_dir() {
        return Err(NotFoundError::Version {
            service: service.to_string(),
            version: version.to_string(),
        }
        .into());
    }
    std::fs::remove_dir_all(&dir)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::manifest::read_ledger;
    use std::fs;

    const DEPLOYMENT: &str = r#"kind: Deployment
apiVersion: apps/v1
metadata:
  name: {{slug_name_version}}
  namespace: {{namespace}}
  annotations:
    shipper/bundle: deploy
    shipper/project: {{project}}
    shipper/service-name: {{name}}
    shipper/deploy-version: {{version}}
spec:
  template:
    spec:
      containers:
        - name: app
          image: {{deploy_image}}
          env:
{{#each deploy_variables}}
            - name: {{@key}}
              value: {{json this}}
{{/each}}
"#;

    fn ctx(version: Version) -> DeployContext {
        DeployContext {
            project: "acme".to_string(),
            name: "service.foo".to_string(),
            slug_name: "s-foo".to_string(),
            version: version.to_string(),
            slug_name_version: format!("s-foo-{version}"),
            deploy_image: "gcr.io/acme/service.foo:0123456".to_string(),
            namespace: "prod".to_string(),
            deploy_variables: deploy_variables(&[ConfigItem {
                name: "db".to_string(),
                values: [("host".to_string(), "db.internal".to_string())].into(),
            }])
            .unwrap(),
            secret_mounts: Vec::new(),
        }
    }

    fn setup(template: &str) -> tempfile::TempDir {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("templates/deploy/web");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("deployment.yaml"), template).unwrap();
        tmp
    }

    #[test]
    fn deploy_variables_are_json() {
        let vars = ctx(Version::FIRST).deploy_variables;
        assert_eq!(vars["SHIPPER_DB"], r#"{"host":"db.internal"}"#);
    }

    #[test]
    fn deploy_variable_names_are_only_uppercased() {
        let vars = deploy_variables(&[ConfigItem {
            name: "cache-redis.main".to_string(),
            values: BTreeMap::new(),
        }])
        .unwrap();
        assert_eq!(vars.keys().collect::<Vec<_>>(), vec!["SHIPPER_CACHE-REDIS.MAIN"]);
        assert_eq!(vars["SHIPPER_CACHE-REDIS.MAIN"], "{}");
    }

    #[test]
    fn renders_deploy_bundle_visible_to_ledger() {
        let tmp = setup(DEPLOYMENT);
        let templates = tmp.path().join("templates");
        let manifests = tmp.path().join("manifests");
        let v1 = Version::FIRST;

        let files = write_deploy_bundle(&templates, &manifests, "web", v1, &ctx(v1)).unwrap();
        assert_eq!(files.len(), 1);
        let rendered = fs::read_to_string(&files[0]).unwrap();
        assert!(rendered.contains("image: gcr.io/acme/service.foo:0123456"));
        assert!(rendered.contains("SHIPPER_DB"));

        let state = read_ledger(&manifests, "acme").unwrap();
        assert_eq!(state.current_version_for("service.foo"), 1);
    }

    #[test]
    fn existing_version_conflicts() {
        let tmp = setup(DEPLOYMENT);
        let templates = tmp.path().join("templates");
        let manifests = tmp.path().join("manifests");
        let v1 = Version::FIRST;

        write_deploy_bundle(&templates, &manifests, "web", v1, &ctx(v1)).unwrap();
        let err = write_deploy_bundle(&templates, &manifests, "web", v1, &ctx(v1)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ShipperError::Conflict(ConflictError::VersionExists { .. })
        ));
    }

    #[test]
    fn template_without_annotations_is_rejected() {
        let tmp = setup("kind: ConfigMap\nmetadata:\n  name: {{slug_name}}\n");
        let v1 = Version::FIRST;
        let err = write_deploy_bundle(
            &tmp.path().join("templates"),
            &tmp.path().join("manifests"),
            "web",
            v1,
            &ctx(v1),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            crate::error::ShipperError::Bundle(BundleError::MissingAnnotations { .. })
        ));
    }

    #[test]
    fn missing_template_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let v1 = Version::FIRST;
        let err = write_deploy_bundle(tmp.path(), tmp.path(), "web", v1, &ctx(v1)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::ShipperError::NotFound(NotFoundError::Template { .. })
        ));
    }

    #[test]
    fn release_bundle_sets_active_version() {
        let tmp = setup(DEPLOYMENT);
        let templates = tmp.path().join("templates");
        let manifests = tmp.path().join("manifests");
        let v1 = Version::FIRST;
        write_deploy_bundle(&templates, &manifests, "web", v1, &ctx(v1)).unwrap();

        write_release_bundle(
            &manifests,
            &ReleaseContext {
                project: "acme".to_string(),
                name: "service.foo".to_string(),
                slug_name: "s-foo".to_string(),
                version: v1.to_string(),
                slug_name_version: "s-foo-v1".to_string(),
                namespace: "prod".to_string(),
            },
        )
        .unwrap();

        let state = read_ledger(&manifests, "acme").unwrap();
        assert_eq!(state.service("service.foo").unwrap().release, Some(v1));
    }

    #[test]
    fn delete_removes_only_that_version() {
        let tmp = setup(DEPLOYMENT);
        let templates = tmp.path().join("templates");
        let manifests = tmp.path().join("manifests");
        let v1 = Version::FIRST;
        let v2 = v1.next().unwrap();
        write_deploy_bundle(&templates, &manifests, "web", v1, &ctx(v1)).unwrap();
        write_deploy_bundle(&templates, &manifests, "web", v2, &ctx(v2)).unwrap();

        delete_deploy_bundle(&manifests, "service.foo", v1).unwrap();
        let state = read_ledger(&manifests, "acme").unwrap();
        let svc = state.service("service.foo").unwrap();
        assert!(!svc.has_version(v1));
        assert!(svc.has_version(v2));

        assert!(delete_deploy_bundle(&manifests, "service.foo", v1).is_err());
    }
}
