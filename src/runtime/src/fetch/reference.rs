//! Remote layer reference parsing.
//!
//! Parses repository URLs like `https://github.com/org/web-layer.git` or
//! `git@github.com:org/web-layer.git` into host, owner path and repository
//! name, and derives the cache key for a (repository, branch) pair.

use osconfig_core::error::{OsConfigError, Result};
use sha2::{Digest, Sha256};

/// Parsed git repository reference pinned to a branch or tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReference {
    /// URL as given by the caller (trimmed)
    pub url: String,
    /// Lowercased hostname, without user or port
    pub host: String,
    /// Path between host and repository (e.g. "org" or "group/subgroup")
    pub owner: String,
    /// Repository name without the `.git` suffix
    pub repository: String,
    /// Branch or tag
    pub branch: String,
}

impl RemoteReference {
    /// Parse and validate a repository URL and branch.
    ///
    /// Supports formats:
    /// - `https://host[:port]/owner/repo(.git)`
    /// - `http://host[:port]/owner/repo(.git)`
    /// - `ssh://[user@]host[:port]/owner/repo(.git)`
    /// - `user@host:owner/repo(.git)`
    ///
    /// Pure: no filesystem or network access happens here.
    pub fn parse(url: &str, branch: &str) -> Result<Self> {
        let url = url.trim();
        if url.is_empty() {
            return Err(OsConfigError::InvalidReference(
                "Empty repository URL".to_string(),
            ));
        }
        if url.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(OsConfigError::InvalidReference(format!(
                "Repository URL contains whitespace: '{}'",
                url
            )));
        }
        validate_branch(branch)?;

        let (host, path) = split_host_path(url)?;
        validate_host(url, host)?;

        if path.contains('?') || path.contains('#') {
            return Err(OsConfigError::InvalidReference(format!(
                "Query or fragment not allowed in repository URL '{}'",
                url
            )));
        }

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        if segments
            .iter()
            .any(|s| s.is_empty() || *s == "." || *s == "..")
        {
            return Err(OsConfigError::InvalidReference(format!(
                "Invalid repository path in '{}'",
                url
            )));
        }

        let (last, owner) = match segments.split_last() {
            Some(parts) => parts,
            None => {
                return Err(OsConfigError::InvalidReference(format!(
                    "Missing repository name in '{}'",
                    url
                )))
            }
        };
        let repository = last.strip_suffix(".git").unwrap_or(last);
        if repository.is_empty() {
            return Err(OsConfigError::InvalidReference(format!(
                "Missing repository name in '{}'",
                url
            )));
        }

        Ok(RemoteReference {
            url: url.to_string(),
            host: host.to_ascii_lowercase(),
            owner: owner.join("/"),
            repository: repository.to_string(),
            branch: branch.to_string(),
        })
    }

    /// Same repository, different branch or tag.
    pub fn with_branch(&self, branch: &str) -> Result<Self> {
        validate_branch(branch)?;
        Ok(Self {
            branch: branch.to_string(),
            ..self.clone()
        })
    }

    /// Deterministic cache key for this (repository, branch) pair.
    ///
    /// `<repository>-<branch>-<12 hex of sha256(host/owner/repository#branch)>`.
    /// HTTPS and SSH URLs of the same repository share a key.
    pub fn cache_key(&self) -> String {
        let identity = format!(
            "{}/{}/{}#{}",
            self.host, self.owner, self.repository, self.branch
        );
        let digest = hex::encode(Sha256::digest(identity.as_bytes()));
        format!(
            "{}-{}-{}",
            sanitize(&self.repository),
            sanitize(&self.branch),
            &digest[..12]
        )
    }
}

impl std::fmt::Display for RemoteReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.url, self.branch)
    }
}

/// Split a URL into (host, path), accepting only http(s), ssh and scp-like forms.
fn split_host_path(url: &str) -> Result<(&str, &str)> {
    for scheme in ["https://", "http://", "ssh://"] {
        if let Some(rest) = url.strip_prefix(scheme) {
            let (authority, path) = rest.split_once('/').ok_or_else(|| {
                OsConfigError::InvalidReference(format!("Missing repository path in '{}'", url))
            })?;
            let host_port = authority
                .rsplit_once('@')
                .map(|(_, host)| host)
                .unwrap_or(authority);
            let host = match host_port.split_once(':') {
                Some((host, port)) => {
                    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                        return Err(OsConfigError::InvalidReference(format!(
                            "Invalid port in '{}'",
                            url
                        )));
                    }
                    host
                }
                None => host_port,
            };
            return Ok((host, path));
        }
    }

    if url.contains("://") {
        return Err(OsConfigError::InvalidReference(format!(
            "Unsupported URL scheme in '{}': expected http(s) or ssh",
            url
        )));
    }

    // scp-like syntax: user@host:path
    let (user_host, path) = url.split_once(':').ok_or_else(|| {
        OsConfigError::InvalidReference(format!(
            "'{}' is neither an http(s) URL nor an ssh reference",
            url
        ))
    })?;
    let (user, host) = user_host.split_once('@').ok_or_else(|| {
        OsConfigError::InvalidReference(format!(
            "ssh reference '{}' must have the form user@host:path",
            url
        ))
    })?;
    if user.is_empty() {
        return Err(OsConfigError::InvalidReference(format!(
            "Missing user in ssh reference '{}'",
            url
        )));
    }
    Ok((host, path))
}

fn validate_host(url: &str, host: &str) -> Result<()> {
    let valid = !host.is_empty()
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && !host.starts_with(['.', '-'])
        && !host.ends_with(['.', '-']);
    if valid {
        Ok(())
    } else {
        Err(OsConfigError::InvalidReference(format!(
            "Invalid host '{}' in '{}'",
            host, url
        )))
    }
}

/// Reject refs git would refuse or misread as options.
fn validate_branch(branch: &str) -> Result<()> {
    let invalid = branch.is_empty()
        || branch.starts_with('-')
        || branch.starts_with('/')
        || branch.ends_with('/')
        || branch.ends_with(".lock")
        || branch.contains("..")
        || branch.contains("@{")
        || branch.chars().any(|c| {
            c.is_whitespace() || c.is_control() || matches!(c, '~' | '^' | ':' | '?' | '*' | '[' | '\\')
        });
    if invalid {
        return Err(OsConfigError::InvalidReference(format!(
            "Invalid branch or tag '{}'",
            branch
        )));
    }
    Ok(())
}

/// Make a string safe as a single directory-name component.
fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
