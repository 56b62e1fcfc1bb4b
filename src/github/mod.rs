//! GitHub REST API access for resolving refs and reading CI results

mod client;
pub mod models;

pub use client::{DEFAULT_API_URL, GitHubClient};
