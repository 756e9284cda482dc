//! Socket URL parsing

use crate::error::{Result, TransportError};
use std::path::PathBuf;

const SCHEMES: &[&str] = &["http+unix://", "unix://"];

/// Derive the filesystem socket path from an `http+unix://` or `unix://` URL
///
/// The remainder after the scheme may be raw (`http+unix:///var/run/docker.sock`)
/// or percent-encoded (`http+unix://%2Fvar%2Frun%2Fdocker.sock`). A leading `/`
/// is added when missing.
pub fn socket_path_from_url(url: &str) -> Result<PathBuf> {
    let rest = SCHEMES
        .iter()
        .find_map(|scheme| url.strip_prefix(scheme))
        .ok_or_else(|| TransportError::InvalidUrl {
            url: url.to_string(),
            reason: "expected http+unix:// or unix:// scheme".to_string(),
        })?;

    let decoded = urlencoding::decode(rest).map_err(|e| TransportError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    if decoded.trim_start_matches('/').is_empty() {
        return Err(TransportError::InvalidUrl {
            url: url.to_string(),
            reason: "socket path is empty".to_string(),
        });
    }

    if decoded.starts_with('/') {
        Ok(PathBuf::from(decoded.into_owned()))
    } else {
        Ok(PathBuf::from(format!("/{}", decoded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_absolute_path() {
        let path = socket_path_from_url("http+unix:///var/run/docker.sock").unwrap();
        assert_eq!(path, PathBuf::from("/var/run/docker.sock"));
    }

    #[test]
    fn test_missing_leading_slash_is_added() {
        let path = socket_path_from_url("http+unix://var/run/docker.sock").unwrap();
        assert_eq!(path, PathBuf::from("/var/run/docker.sock"));
    }

    #[test]
    fn test_percent_encoded_path() {
        let path = socket_path_from_url("http+unix://%2Fvar%2Frun%2Fdocker.sock").unwrap();
        assert_eq!(path, PathBuf::from("/var/run/docker.sock"));
    }

    #[test]
    fn test_plain_unix_scheme() {
        let path = socket_path_from_url("unix:///run/user/1000/docker.sock").unwrap();
        assert_eq!(path, PathBuf::from("/run/user/1000/docker.sock"));
    }

    #[test]
    fn test_tcp_scheme_rejected() {
        let err = socket_path_from_url("tcp://127.0.0.1:2375").unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl { .. }));
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(socket_path_from_url("http+unix://").is_err());
        assert!(socket_path_from_url("unix:///").is_err());
    }
}
