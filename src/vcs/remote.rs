//! Remote URL normalization.
//!
//! The canonical form is the web URL of the repository: SSH-style remotes
//! become `https://`, and a trailing `.git` is dropped, so
//! `git@github.com:org/repo.git` and `https://github.com/org/repo` identify the
//! same repository.

/// Canonical HTTPS-style form of a remote URL.
pub fn canonical_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let trimmed = trimmed.strip_suffix(".git").unwrap_or(trimmed);

    // scp-like syntax: git@host:path
    if let Some(rest) = trimmed.strip_prefix("git@") {
        if let Some((host, path)) = rest.split_once(':') {
            return format!("https://{}/{}", host, path.trim_start_matches('/'));
        }
    }

    if let Some(rest) = trimmed.strip_prefix("ssh://") {
        let rest = rest.split_once('@').map_or(rest, |(_, host_and_path)| host_and_path);
        if let Some((host, path)) = rest.split_once('/') {
            // drop an explicit port, the web URL never carries it
            let host = host.split_once(':').map_or(host, |(host, _)| host);
            return format!("https://{}/{}", host, path);
        }
    }

    trimmed.to_string()
}

/// Last path segment of a canonical URL, if it has one.
pub fn repository_name(url: &str) -> Option<&str> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && !name.contains(':'))
}
