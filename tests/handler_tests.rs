#[cfg(test)]
mod tests {
    use shipper::destination::{
        Artifact, DeployBatch, Destination, DestinationAck, DestinationService, DestinationState,
        Version, VersionTarget,
    };
    use shipper::error::{ConflictError, NotFoundError, Result, ShipperError};
    use shipper::handler::{
        ConfirmDeploy, DeployParams, DeployStatus, Handler, ReleaseParams, RemoveParams,
        ServiceDeployRequest,
    };
    use shipper::project::{DeployConfig, Service};
    use shipper::source::{BuildStatus, GitHash, ResolvedRef, Source, SourceService, SourceSnapshot};
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_util::sync::CancellationToken;

    const PROJECT: &str = "acme";
    const COMMIT: &str = "4f2a9c1d0e8b7a6f5e4d3c2b1a0f9e8d7c6b5a49";

    struct FakeSource {
        snapshot: Mutex<SourceSnapshot>,
        calls: AtomicUsize,
    }

    impl Source for FakeSource {
        async fn get(
            &self,
            _project: &str,
            _reference: &str,
            _cancel: &CancellationToken,
        ) -> Result<SourceSnapshot> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.snapshot.lock().unwrap().clone())
        }
    }

    #[derive(Default)]
    struct FakeDestination {
        state: Mutex<DestinationState>,
        gets: AtomicUsize,
        mutations: Mutex<Vec<String>>,
    }

    impl FakeDestination {
        fn ack(&self, what: String) -> DestinationAck {
            let mut mutations = self.mutations.lock().unwrap();
            mutations.push(what);
            DestinationAck {
                commit: GitHash::new(format!("dest{}", mutations.len())),
            }
        }
    }

    impl Destination for FakeDestination {
        async fn get(&self, _project: &str, _cancel: &CancellationToken) -> Result<DestinationState> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(self.state.lock().unwrap().clone())
        }

        async fn deploy(
            &self,
            batch: &DeployBatch,
            _cancel: &CancellationToken,
        ) -> Result<DestinationAck> {
            let mut state = self.state.lock().unwrap().clone();
            for item in &batch.services {
                state.record_deploy(&item.service.name, item.version, artifact(&item.image));
            }
            *self.state.lock().unwrap() = state.finish();
            Ok(self.ack(format!("deploy {}", batch.services.len())))
        }

        async fn release(
            &self,
            target: &VersionTarget,
            _cancel: &CancellationToken,
        ) -> Result<DestinationAck> {
            self.state
                .lock()
                .unwrap()
                .record_release(&target.service, target.version);
            Ok(self.ack(format!("release {} {}", target.service, target.version)))
        }

        async fn remove(
            &self,
            target: &VersionTarget,
            _cancel: &CancellationToken,
        ) -> Result<DestinationAck> {
            if let Some(svc) = self.state.lock().unwrap().services.get_mut(&target.service) {
                svc.deploys.retain(|d| d.version != target.version);
            }
            Ok(self.ack(format!("remove {} {}", target.service, target.version)))
        }
    }

    fn v(n: u32) -> Version {
        Version::new(n).unwrap()
    }

    fn artifact(name: &str) -> Artifact {
        Artifact {
            path: PathBuf::from("deployment.yaml"),
            kind: "Deployment".to_string(),
            name: name.to_string(),
        }
    }

    fn service(name: &str) -> Service {
        Service {
            name: name.to_string(),
            build: Default::default(),
            deploy: DeployConfig {
                template: "default".to_string(),
                ..Default::default()
            },
            root_dir: format!("services/{name}"),
        }
    }

    fn complete() -> BuildStatus {
        BuildStatus::Complete {
            started_at: None,
            finished_at: None,
        }
    }

    fn snapshot(
        commit: Option<&str>,
        running: bool,
        complete: bool,
        services: &[(&str, BuildStatus)],
    ) -> SourceSnapshot {
        SourceSnapshot {
            project: PROJECT.to_string(),
            registry_prefix: "ghcr.io/acme".to_string(),
            reference: ResolvedRef {
                given_ref: "main".to_string(),
                commit: commit.map(GitHash::new),
                committed_by: Some("octocat".to_string()),
                pull_request: None,
            },
            services: services
                .iter()
                .map(|(name, status)| {
                    (
                        name.to_string(),
                        SourceService {
                            service: service(name),
                            build_status: status.clone(),
                        },
                    )
                })
                .collect::<BTreeMap<_, _>>(),
            checks_running: running,
            checks_complete: complete,
        }
    }

    /// `service.a` has v1 and v2 with v1 released; `service.b` has v9 and v10
    fn ledger() -> DestinationState {
        let mut state = DestinationState::new(PROJECT);
        for n in [1, 2] {
            state.record_deploy("service.a", v(n), artifact("a"));
        }
        state.record_release("service.a", v(1));
        for n in [10, 9] {
            state.record_deploy("service.b", v(n), artifact("b"));
        }
        state.finish()
    }

    fn handler(source: SourceSnapshot, state: DestinationState) -> Handler<FakeSource, FakeDestination> {
        Handler::new(
            PROJECT,
            FakeSource {
                snapshot: Mutex::new(source),
                calls: AtomicUsize::new(0),
            },
            FakeDestination {
                state: Mutex::new(state),
                ..Default::default()
            },
        )
    }

    fn ready() -> SourceSnapshot {
        snapshot(
            Some(COMMIT),
            false,
            true,
            &[
                ("service.a", complete()),
                ("service.b", complete()),
                ("service.new", complete()),
            ],
        )
    }

    fn deploy_params(confirm: Option<ConfirmDeploy>) -> DeployParams {
        DeployParams {
            reference: "main".to_string(),
            confirm,
        }
    }

    fn confirm(commit: &str, requests: &[(&str, u32)]) -> ConfirmDeploy {
        ConfirmDeploy {
            commit: GitHash::new(commit),
            requests: requests
                .iter()
                .map(|(service, n)| ServiceDeployRequest {
                    service: service.to_string(),
                    version: v(*n),
                })
                .collect(),
        }
    }

    fn mutations(h: &Handler<FakeSource, FakeDestination>) -> Vec<String> {
        h.destination().mutations.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn plan_proposes_numeric_next_versions() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let plan = h.deploy(&deploy_params(None), &cancel).await.unwrap();
        assert_eq!(plan.status, DeployStatus::PlanReady);

        let lines: Vec<(String, u32, Option<Version>)> = plan
            .services
            .iter()
            .map(|s| (s.name.clone(), s.current_version, s.next_version))
            .collect();
        assert_eq!(
            lines,
            vec![
                ("service.a".to_string(), 2, Some(v(3))),
                ("service.b".to_string(), 10, Some(v(11))),
                ("service.new".to_string(), 0, Some(v(1))),
            ]
        );
        assert!(mutations(&h).is_empty());
    }

    #[tokio::test]
    async fn plan_is_idempotent() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let first = h.deploy(&deploy_params(None), &cancel).await.unwrap();
        let second = h.deploy(&deploy_params(None), &cancel).await.unwrap();

        assert_eq!(first.services, second.services);
        assert_eq!(first.status, second.status);
        assert_eq!(first.confirmation(), second.confirmation());
    }

    #[tokio::test]
    async fn unmerged_ref_is_not_ready() {
        let h = handler(snapshot(None, false, false, &[]), ledger());

        let resp = h
            .deploy(&deploy_params(None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resp.status, DeployStatus::NotReady);
        assert!(resp.confirmation().is_none());
        assert_eq!(h.destination().gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn running_checks_are_pending_without_versions() {
        let running = BuildStatus::Running { started_at: None };
        let h = handler(
            snapshot(Some(COMMIT), true, false, &[("service.a", running)]),
            ledger(),
        );

        let resp = h
            .deploy(&deploy_params(None), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(resp.status, DeployStatus::ChecksPending);
        assert!(resp.status.is_pending());
        assert_eq!(resp.services[0].next_version, None);
        assert_eq!(h.destination().gets.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_checks_produce_no_plan() {
        let failed = BuildStatus::Failed {
            reason: "failure".to_string(),
        };
        let h = handler(
            snapshot(Some(COMMIT), false, false, &[("service.a", failed)]),
            ledger(),
        );

        let resp = h
            .deploy(&deploy_params(None), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resp.status, DeployStatus::ChecksFailed);
    }

    #[tokio::test]
    async fn confirmed_plan_is_committed_once() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let plan = h.deploy(&deploy_params(None), &cancel).await.unwrap();
        let resp = h
            .deploy(&deploy_params(plan.confirmation()), &cancel)
            .await
            .unwrap();

        assert_eq!(
            resp.status,
            DeployStatus::Committed {
                destination_commit: GitHash::new("dest1")
            }
        );
        assert_eq!(mutations(&h), vec!["deploy 3".to_string()]);

        let state = h.destination().state.lock().unwrap().clone();
        assert_eq!(state.current_version_for("service.a"), 3);
        assert_eq!(state.current_version_for("service.new"), 1);
        let image = &state.service("service.a").unwrap().deploys[2].artifacts[0].name;
        assert_eq!(image, "ghcr.io/acme/service.a:4f2a9c1");
    }

    #[tokio::test]
    async fn confirmation_during_rerun_checks_writes_nothing() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let plan = h.deploy(&deploy_params(None), &cancel).await.unwrap();
        h.source().snapshot.lock().unwrap().checks_running = true;

        let resp = h
            .deploy(&deploy_params(plan.confirmation()), &cancel)
            .await
            .unwrap();

        assert_eq!(resp.status, DeployStatus::ChecksPending);
        assert!(resp.status.is_pending());
        assert!(mutations(&h).is_empty());
    }

    #[tokio::test]
    async fn moved_commit_is_a_conflict_even_with_matching_versions() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let params = deploy_params(Some(confirm("0000000000", &[("service.a", 3)])));
        let err = h.deploy(&params, &cancel).await.unwrap_err();

        assert!(matches!(
            err,
            ShipperError::Conflict(ConflictError::CommitMoved { .. })
        ));
        assert!(mutations(&h).is_empty());
    }

    #[tokio::test]
    async fn drifted_version_is_a_conflict() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let plan = h.deploy(&deploy_params(None), &cancel).await.unwrap();
        let confirmation = plan.confirmation();

        // another operator deploys service.a in between
        h.destination()
            .state
            .lock()
            .unwrap()
            .record_deploy("service.a", v(3), artifact("a"));

        let err = h
            .deploy(&deploy_params(confirmation), &cancel)
            .await
            .unwrap_err();
        match err {
            ShipperError::Conflict(ConflictError::VersionDrift {
                service,
                expected,
                requested,
            }) => {
                assert_eq!(service, "service.a");
                assert_eq!(expected, "v4");
                assert_eq!(requested, "v3");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(mutations(&h).is_empty());
    }

    #[tokio::test]
    async fn confirming_unknown_service_is_not_found() {
        let h = handler(ready(), ledger());

        let params = deploy_params(Some(confirm(COMMIT, &[("service.gone", 1)])));
        let err = h.deploy(&params, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(
            err,
            ShipperError::NotFound(NotFoundError::ServiceNotInSource { .. })
        ));
        assert!(mutations(&h).is_empty());
    }

    #[tokio::test]
    async fn empty_confirmation_fails_before_io() {
        let h = handler(ready(), ledger());

        let params = deploy_params(Some(confirm(COMMIT, &[])));
        let err = h.deploy(&params, &CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ShipperError::Validation(_)));
        assert_eq!(h.source().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn release_scenario() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let plan = h
            .release(
                &ReleaseParams {
                    service: "service.a".to_string(),
                    ..Default::default()
                },
                &cancel,
            )
            .await
            .unwrap();
        assert_eq!(plan.version, v(2));
        assert_eq!(plan.current_release, Some(v(1)));
        assert!(!plan.done);

        let active = h
            .release(
                &ReleaseParams {
                    service: "service.a".to_string(),
                    version: Some(v(1)),
                    confirm: false,
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(active.done);
        assert!(mutations(&h).is_empty());

        let released = h
            .release(
                &ReleaseParams {
                    service: "service.a".to_string(),
                    version: Some(plan.version),
                    confirm: true,
                },
                &cancel,
            )
            .await
            .unwrap();
        assert!(released.done);
        assert_eq!(released.destination_commit, Some(GitHash::new("dest1")));
        assert_eq!(
            h.destination().state.lock().unwrap().service("service.a").unwrap().release,
            Some(v(2))
        );
    }

    #[tokio::test]
    async fn release_errors() {
        let mut state = ledger();
        state
            .services
            .insert("service.empty".to_string(), DestinationService::new(PROJECT, "service.empty"));
        let h = handler(ready(), state);
        let cancel = CancellationToken::new();

        let release = |service: &str, version: Option<Version>, confirm: bool| ReleaseParams {
            service: service.to_string(),
            version,
            confirm,
        };

        let err = h.release(&release("service.x", None, false), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::NotFound(NotFoundError::Service { .. })));

        let err = h.release(&release("service.empty", None, false), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::NotFound(NotFoundError::NoDeploys { .. })));

        let err = h.release(&release("service.a", Some(v(7)), false), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::NotFound(NotFoundError::Version { .. })));

        let err = h.release(&release("service.a", None, true), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::Validation(_)));
        assert!(mutations(&h).is_empty());
    }

    #[tokio::test]
    async fn remove_scenario() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let remove = |n: u32, confirm: bool| RemoveParams {
            service: "service.a".to_string(),
            version: Some(v(n)),
            confirm,
        };

        let err = h.remove(&remove(1, false), &cancel).await.unwrap_err();
        assert!(err.to_string().contains("active version cannot be removed"));
        assert!(matches!(
            err,
            ShipperError::Conflict(ConflictError::ActiveVersion { .. })
        ));

        let err = h.remove(&remove(5, false), &cancel).await.unwrap_err();
        assert!(matches!(err, ShipperError::NotFound(NotFoundError::Version { .. })));

        let plan = h.remove(&remove(2, false), &cancel).await.unwrap();
        assert!(!plan.done);
        assert!(mutations(&h).is_empty());

        let removed = h.remove(&remove(2, true), &cancel).await.unwrap();
        assert!(removed.done);
        assert_eq!(mutations(&h), vec!["remove service.a v2".to_string()]);
        assert!(!h.destination().state.lock().unwrap().service("service.a").unwrap().has_version(v(2)));
    }

    #[tokio::test]
    async fn remove_requires_service_and_version_before_io() {
        let h = handler(ready(), ledger());
        let cancel = CancellationToken::new();

        let missing_version = RemoveParams {
            service: "service.a".to_string(),
            version: None,
            confirm: true,
        };
        let missing_service = RemoveParams {
            service: " ".to_string(),
            version: Some(v(2)),
            confirm: false,
        };

        for params in [missing_version, missing_service] {
            let err = h.remove(&params, &cancel).await.unwrap_err();
            assert!(matches!(err, ShipperError::Validation(_)));
        }
        assert_eq!(h.destination().gets.load(Ordering::SeqCst), 0);
        assert!(mutations(&h).is_empty());
    }
}
