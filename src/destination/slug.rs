use crate::error::{BundleError, Result};

/// Kubernetes resource name for a service: `service.foo` becomes `s-foo`,
/// `api.gateway` becomes `api-gateway`.
pub fn slugify_service_name(name: &str) -> Result<String> {
    let slug = name.replacen("service.", "s-", 1).replacen("api.", "api-", 1);

    if slug.contains('.') {
        return Err(BundleError::Slug {
            name: name.to_string(),
            reason: "only a leading 'service.' or 'api.' may contain a dot".to_string(),
        }
        .into());
    }

    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if !valid {
        return Err(BundleError::Slug {
            name: name.to_string(),
            reason: "resource names are lowercase letters, digits and '-'".to_string(),
        }
        .into());
    }

    Ok(slug)
}
