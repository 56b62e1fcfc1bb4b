//! # shipper
//!
//! Promote a change for a multi-service project through deploy, release and
//! remove by reconciling two systems: GitHub, which says what commit a ref
//! points at and how CI went for each service, and a gitops repository of
//! annotated Kubernetes manifests, which is the ledger of what is deployed.
//!
//! ## Features
//!
//! - **Ref resolution**: trunk branch, pull request number or branch name
//! - **Per-service CI status**: jobs are matched to services by name
//! - **Ledger from manifests**: versions and releases are read back from
//!   `shipper/*` annotations on every call, never cached
//! - **Plan, then confirm**: mutations re-validate the plan against fresh
//!   state and land as one commit and push
//!
//! ## Usage
//!
//! ```bash
//! shipper deploy 123                  # deploy the merge commit of PR #123
//! shipper release service.foo         # route traffic to the latest deploy
//! shipper rm service.foo v1           # remove an old deploy
//! shipper ci list-services            # services CI should build, as JSON
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod destination;
pub mod error;
pub mod git;
pub mod github;
pub mod handler;
pub mod project;
pub mod source;

pub use cli::Args;
pub use destination::{Destination, DestinationState, GitopsDestination, Version};
pub use error::{Result, ShipperError};
pub use handler::Handler;
pub use project::{Project, Service};
pub use source::{GitHash, GithubSource, Source, SourceSnapshot};
