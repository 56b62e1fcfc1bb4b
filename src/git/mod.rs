//! Git plumbing for scratch clones of the source and gitops repositories.
//!
//! Network operations shell out to the `git` executable so the user's
//! transport setup applies; reading commit ids out of a clone uses gix.
//! Every clone lives in a uniquely named temp directory that is removed when
//! the [`Checkout`] is dropped, so partial writes never outlive a command.

mod cli;
mod scratch;

pub use cli::{Checkout, GitCli, GitIdentity};
pub use scratch::ScratchDir;

use crate::error::{ConfigError, Result};
use url::Url;

/// Clone URL for a repository locator; HTTP(S) URLs carry the token as credentials
pub fn authenticated_url(locator: &str, token: Option<&str>) -> Result<Url> {
    let with_scheme = if locator.contains("://") {
        locator.to_string()
    } else {
        format!("https://{locator}")
    };

    let mut url = Url::parse(&with_scheme).map_err(|_| ConfigError::Repository {
        repo: locator.to_string(),
    })?;

    if let Some(token) = token
        && matches!(url.scheme(), "http" | "https")
    {
        let invalid = |_| ConfigError::Repository {
            repo: locator.to_string(),
        };
        url.set_username("x-access-token").map_err(invalid)?;
        url.set_password(Some(token)).map_err(invalid)?;
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_scheme_and_credentials() {
        let url = authenticated_url("github.com/acme/gitops", Some("s3cret")).unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.username(), "x-access-token");
        assert_eq!(url.password(), Some("s3cret"));
        assert_eq!(url.path(), "/acme/gitops");
    }

    #[test]
    fn keeps_explicit_scheme() {
        let url = authenticated_url("file:///srv/git/gitops.git", Some("s3cret")).unwrap();
        assert_eq!(url.scheme(), "file");
        assert_eq!(url.path(), "/srv/git/gitops.git");
        assert_eq!(url.password(), None);
    }
}
