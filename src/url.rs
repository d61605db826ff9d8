//! URL input handling.

use crate::error::InputError;

/// Normalize user input to an `https://` URL.
///
/// Any existing `http://` or `https://` prefix is dropped and `https://` is
/// prepended, so `example.com` and `http://example.com` both become
/// `https://example.com`.
pub fn normalize_url(input: &str) -> Result<String, InputError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(InputError::EmptyUrl);
    }

    let without_scheme = strip_scheme(trimmed);
    let host = host_of(without_scheme);

    if host.is_empty() {
        return Err(InputError::InvalidUrl {
            url: input.to_string(),
            reason: "missing host".to_string(),
        });
    }
    if host.chars().any(|c| c.is_whitespace()) {
        return Err(InputError::InvalidUrl {
            url: input.to_string(),
            reason: "host contains whitespace".to_string(),
        });
    }
    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '.' | '-' | ':' | '[' | ']' | '_'))
    {
        return Err(InputError::InvalidUrl {
            url: input.to_string(),
            reason: "host contains invalid characters".to_string(),
        });
    }

    Ok(format!("https://{}", without_scheme))
}

/// Extract the host (without port) from a URL with or without scheme.
pub fn host_from_url(url: &str) -> String {
    let host = host_of(strip_scheme(url.trim()));

    // Bracketed IPv6 literal: everything after `]` is the port.
    if host.starts_with('[') {
        if let Some(end) = host.find(']') {
            return host[..=end].to_string();
        }
    }

    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name.to_string(),
        _ => host.to_string(),
    }
}

fn strip_scheme(url: &str) -> &str {
    for scheme in ["https://", "http://"] {
        if url.len() >= scheme.len() && url[..scheme.len()].eq_ignore_ascii_case(scheme) {
            return &url[scheme.len()..];
        }
    }
    url
}

fn host_of(without_scheme: &str) -> &str {
    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or("")
}
