use std::fmt;
use thiserror::Error;

/// Partition of URL schemes, per spec §3.1.
///
/// The partition determines how the provider scheduler and the refresh
/// workflow treat a repository's origin: downloading schemes go through the
/// worker protocol's `Downloading` worker type, mountable/volatile-mountable
/// schemes go through attach/detach, and plugin schemes are opaque.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    Downloading,
    Mountable,
    VolatileMountable,
    Plugin,
}

impl Scheme {
    /// Classify a scheme name, e.g. `"https"`, `"nfs"`, `"cd"`.
    ///
    /// Unknown schemes default to [`Scheme::Plugin`], the catch-all
    /// partition for anything not explicitly listed (§3.1).
    pub fn classify(scheme: &str) -> Self {
        match scheme {
            "http" | "https" | "ftp" | "tftp" => Scheme::Downloading,
            "nfs" | "smb" | "cifs" | "iso" | "dir" | "file" => Scheme::Mountable,
            "cd" | "dvd" => Scheme::VolatileMountable,
            _ => Scheme::Plugin,
        }
    }

    pub fn is_downloading(self) -> bool {
        matches!(self, Scheme::Downloading)
    }

    pub fn is_mountable(self) -> bool {
        matches!(self, Scheme::Mountable | Scheme::VolatileMountable)
    }

    pub fn is_volatile_mountable(self) -> bool {
        matches!(self, Scheme::VolatileMountable)
    }
}

#[derive(Debug, Error)]
pub enum UrlError {
    #[error("url is missing a scheme: {0:?}")]
    MissingScheme(String),
    #[error("url has an empty authority and path: {0:?}")]
    Empty(String),
}

/// A repository or mirror URL: scheme + authority + path + query.
///
/// This is a deliberately minimal parser — full RFC 3986 handling,
/// `repovars` substitution, and credential extraction are external
/// collaborators per spec §1/§9 Open Questions.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Url {
    raw: String,
    scheme_name: String,
    authority: String,
    path: String,
    query: Option<String>,
}

impl Url {
    /// Parse a URL string.
    ///
    /// Only the scheme separator `://` (or bare `scheme:path` for local
    /// schemes such as `dir:`) and a `?query` suffix are split out; no
    /// percent-decoding or normalization is performed.
    pub fn parse(raw: &str) -> Result<Self, UrlError> {
        let (scheme_name, rest) = raw
            .split_once(':')
            .ok_or_else(|| UrlError::MissingScheme(raw.to_string()))?;
        if scheme_name.is_empty() {
            return Err(UrlError::MissingScheme(raw.to_string()));
        }

        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let (rest, query) = match rest.split_once('?') {
            Some((r, q)) => (r, Some(q.to_string())),
            None => (rest, None),
        };

        let (authority, path) = match rest.split_once('/') {
            Some((a, p)) => (a.to_string(), format!("/{p}")),
            None => (rest.to_string(), String::new()),
        };

        if authority.is_empty() && path.is_empty() {
            return Err(UrlError::Empty(raw.to_string()));
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme_name: scheme_name.to_string(),
            authority,
            path,
            query,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme_name
    }

    pub fn classify(&self) -> Scheme {
        Scheme::classify(&self.scheme_name)
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// Host portion of the authority, with any `user:pass@` and `:port`
    /// stripped.
    pub fn host(&self) -> &str {
        let auth = self
            .authority
            .rsplit_once('@')
            .map(|(_, h)| h)
            .unwrap_or(&self.authority);
        auth.split_once(':').map(|(h, _)| h).unwrap_or(auth)
    }

    /// True if the host is a numeric (IPv4/IPv6) literal.
    pub fn host_is_numeric(&self) -> bool {
        let host = self.host();
        host.parse::<std::net::IpAddr>().is_ok()
            || (host.starts_with('[') && host.ends_with(']'))
    }

    /// Append a path segment, returning a new URL.
    pub fn joined(&self, segment: &str) -> Self {
        let mut joined = self.clone();
        if !joined.path.ends_with('/') && !segment.starts_with('/') {
            joined.path.push('/');
        }
        joined.path.push_str(segment);
        joined.raw = joined.to_string();
        joined
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for Url {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}{}", self.scheme_name, self.authority, self.path)?;
        if let Some(q) = &self.query {
            write!(f, "?{q}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Url {
    type Err = UrlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_schemes() {
        assert_eq!(Scheme::classify("https"), Scheme::Downloading);
        assert_eq!(Scheme::classify("nfs"), Scheme::Mountable);
        assert_eq!(Scheme::classify("cd"), Scheme::VolatileMountable);
        assert_eq!(Scheme::classify("rsync"), Scheme::Plugin);
    }

    #[test]
    fn parses_authority_and_path() {
        let url = Url::parse("https://example.org/repo/path?x=1").unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.authority(), "example.org");
        assert_eq!(url.path(), "/repo/path");
        assert_eq!(url.query(), Some("x=1"));
    }

    #[test]
    fn parses_dir_scheme_without_authority() {
        let url = Url::parse("dir:///tmp/missing").unwrap();
        assert_eq!(url.scheme(), "dir");
        assert_eq!(url.path(), "/tmp/missing");
    }

    #[test]
    fn recognizes_numeric_hosts() {
        let url = Url::parse("http://127.0.0.1/repo").unwrap();
        assert!(url.host_is_numeric());
        let url = Url::parse("http://mirror.example.org/repo").unwrap();
        assert!(!url.host_is_numeric());
    }
}
