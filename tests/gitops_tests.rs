//! End to end tests of the gitops destination against a local bare repository.
//! Skipped when `git` is not installed.

#[cfg(test)]
mod tests {
    use shipper::destination::{
        DeployBatch, Destination, GitopsDestination, ServiceDeploy, Version, VersionTarget,
    };
    use shipper::error::{ConflictError, ShipperError};
    use shipper::git::GitCli;
    use shipper::project::{DeployConfig, GitopsConfig, Project, Service};
    use shipper::source::GitHash;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use tokio_util::sync::CancellationToken;

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
"#;

    fn git(cwd: &Path, args: &[&str]) {
        let status = Command::new("git")
            .args(["-c", "user.name=test", "-c", "user.email=test@localhost"])
            .args(args)
            .current_dir(cwd)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    /// Bare repository seeded with one deploy template
    fn gitops_remote(tmp: &Path) -> PathBuf {
        let seed = tmp.join("seed");
        let bare = tmp.join("gitops.git");
        fs::create_dir_all(seed.join("templates/deploy/web")).unwrap();
        fs::write(seed.join("templates/deploy/web/deployment.yaml"), DEPLOYMENT).unwrap();

        git(tmp, &["init", "--quiet", "--bare", bare.to_str().unwrap()]);
        git(&seed, &["init", "--quiet"]);
        git(&seed, &["checkout", "--quiet", "-b", "main"]);
        git(&seed, &["add", "--all"]);
        git(&seed, &["commit", "--quiet", "-m", "templates"]);
        git(&seed, &["push", "--quiet", bare.to_str().unwrap(), "main"]);
        git(&bare, &["symbolic-ref", "HEAD", "refs/heads/main"]);
        bare
    }

    fn service() -> Service {
        Service {
            name: "service.foo".to_string(),
            build: Default::default(),
            deploy: DeployConfig {
                template: "web".to_string(),
                ..Default::default()
            },
            root_dir: "services/foo".to_string(),
        }
    }

    fn destination(remote: &Path) -> GitopsDestination {
        let project = Project {
            name: "acme".to_string(),
            repo: "github.com/acme/platform".to_string(),
            registry_prefix: "ghcr.io/acme".to_string(),
            trunk: "main".to_string(),
            paths: vec![],
            gitops: GitopsConfig {
                repo: format!("file://{}", remote.display()),
                manifest_path: "manifests".to_string(),
                template_path: "templates".to_string(),
                namespace: "prod".to_string(),
            },
            root_dir: PathBuf::from("."),
            services: vec![service()],
        };
        GitopsDestination::new(&project, GitCli::locate(None).unwrap())
    }

    fn batch(n: u32) -> DeployBatch {
        DeployBatch {
            project: "acme".to_string(),
            commit: GitHash::new("0123456789abcdef"),
            services: vec![ServiceDeploy {
                service: service(),
                version: Version::new(n).unwrap(),
                image: "ghcr.io/acme/service.foo:0123456".to_string(),
            }],
        }
    }

    fn target(n: u32) -> VersionTarget {
        VersionTarget {
            project: "acme".to_string(),
            service: "service.foo".to_string(),
            version: Version::new(n).unwrap(),
        }
    }

    #[tokio::test]
    async fn deploy_release_remove_round() {
        if which::which("git").is_err() {
            eprintln!("git not installed, skipping");
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let remote = gitops_remote(tmp.path());
        let dest = destination(&remote);
        let cancel = CancellationToken::new();

        let state = dest.get("acme", &cancel).await.unwrap();
        assert!(state.services.is_empty());

        dest.deploy(&batch(1), &cancel).await.unwrap();
        dest.release(&target(1), &cancel).await.unwrap();
        dest.deploy(&batch(2), &cancel).await.unwrap();

        let state = dest.get("acme", &cancel).await.unwrap();
        let svc = state.service("service.foo").unwrap();
        assert_eq!(svc.current_version(), 2);
        assert_eq!(svc.release, Version::new(1));
        assert_eq!(svc.deploys[0].artifacts[0].name, "s-foo-v1");

        let err = dest.release(&target(1), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::Conflict(ConflictError::AlreadyReleased { .. })));

        let err = dest.remove(&target(1), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::Conflict(ConflictError::ActiveVersion { .. })));

        let err = dest.deploy(&batch(2), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::Conflict(ConflictError::VersionExists { .. })));

        let err = dest.deploy(&batch(5), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::Conflict(ConflictError::VersionDrift { .. })));

        let ack = dest.remove(&target(2), &cancel).await.unwrap();
        assert!(!ack.commit.as_str().is_empty());

        let state = dest.get("acme", &cancel).await.unwrap();
        let svc = state.service("service.foo").unwrap();
        assert_eq!(svc.current_version(), 1);
        assert_eq!(svc.next_version().unwrap(), Version::new(2).unwrap());
    }
}
