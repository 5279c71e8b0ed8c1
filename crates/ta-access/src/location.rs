// location.rs — Code origin locations.
//
// A location is a URL-shaped descriptor: protocol, optional host, optional
// port, path, optional fragment. Hosts may be wildcarded ("*", or
// "*.example.com" for a domain subtree). Matching treats an absent host and
// "localhost" as equivalent, ports against the protocol's default, and
// paths in three modes keyed on the granted path's suffix ("/-" subtree,
// "/*" single level, exact otherwise).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AccessError;

/// A parsed origin location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OriginUrl {
    protocol: String,
    host: Option<String>,
    port: Option<u16>,
    path: String,
    fragment: Option<String>,
}

impl OriginUrl {
    /// Parse a location of the form
    /// `protocol:[//host[:port]][/path][#fragment]`.
    pub fn parse(location: &str) -> Result<Self, AccessError> {
        let invalid = |reason: &str| AccessError::InvalidLocation {
            location: location.to_string(),
            reason: reason.to_string(),
        };

        let (protocol, rest) = location
            .split_once(':')
            .ok_or_else(|| invalid("missing protocol separator ':'"))?;
        if protocol.is_empty() {
            return Err(invalid("empty protocol"));
        }
        if !protocol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.')
        {
            return Err(invalid("protocol contains invalid characters"));
        }

        let (rest, fragment) = match rest.split_once('#') {
            Some((body, fragment)) => (body, Some(fragment.to_string())),
            None => (rest, None),
        };

        let (host, port, path) = if let Some(after) = rest.strip_prefix("//") {
            let (authority, path) = match after.find('/') {
                Some(slash) => (&after[..slash], after[slash..].to_string()),
                None => (after, String::new()),
            };
            let (host, port) = match authority.rsplit_once(':') {
                Some((host, port)) => {
                    let port: u16 = port.parse().map_err(|_| invalid("invalid port"))?;
                    (host, Some(port))
                }
                None => (authority, None),
            };
            let host = if host.is_empty() {
                None
            } else {
                Some(host.to_string())
            };
            (host, port, path)
        } else {
            (None, None, rest.to_string())
        };

        Ok(Self {
            protocol: protocol.to_string(),
            host,
            port,
            path,
            fragment,
        })
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// The host component; an origin without an authority has none.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fragment(&self) -> Option<&str> {
        self.fragment.as_deref()
    }

    /// The explicit port, or the protocol's default when none was given.
    pub fn effective_port(&self) -> Option<u16> {
        self.port.or_else(|| default_port(&self.protocol))
    }

    /// Whether this (granted) location covers the candidate location.
    ///
    /// All checks are conjunctive: protocol case-insensitively, effective
    /// port when the grant pins one, path per the grant's suffix mode,
    /// fragment when the grant pins one, and host containment last.
    pub fn implies(&self, candidate: &OriginUrl) -> bool {
        if self == candidate {
            return true;
        }
        if !self.protocol.eq_ignore_ascii_case(&candidate.protocol) {
            return false;
        }
        if let Some(port) = self.port {
            if candidate.effective_port() != Some(port) {
                return false;
            }
        }
        if !path_implies(&self.path, &candidate.path) {
            return false;
        }
        if let Some(fragment) = &self.fragment {
            if candidate.fragment.as_deref() != Some(fragment.as_str()) {
                return false;
            }
        }
        host_implies(
            self.host.as_deref().unwrap_or(""),
            candidate.host.as_deref().unwrap_or(""),
        )
    }
}

impl fmt::Display for OriginUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.protocol)?;
        if let Some(host) = &self.host {
            write!(f, "//{host}")?;
            if let Some(port) = self.port {
                write!(f, ":{port}")?;
            }
        }
        write!(f, "{}", self.path)?;
        if let Some(fragment) = &self.fragment {
            write!(f, "#{fragment}")?;
        }
        Ok(())
    }
}

impl TryFrom<String> for OriginUrl {
    type Error = AccessError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<OriginUrl> for String {
    fn from(url: OriginUrl) -> Self {
        url.to_string()
    }
}

/// Default port per protocol, for grants that pin a port against
/// candidates that rely on the protocol default.
fn default_port(protocol: &str) -> Option<u16> {
    match protocol.to_ascii_lowercase().as_str() {
        "http" => Some(80),
        "https" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

/// Path containment in three mutually exclusive modes keyed on the granted
/// path's suffix.
fn path_implies(granted: &str, candidate: &str) -> bool {
    if let Some(stem) = granted.strip_suffix('-').filter(|_| granted.ends_with("/-")) {
        // Recursive subtree: "/a/b/-" covers everything under "/a/b/".
        candidate.starts_with(stem)
    } else if let Some(stem) = granted.strip_suffix('*').filter(|_| granted.ends_with("/*")) {
        // Single level: the candidate's last '/' must close the stem, so
        // nothing deeper matches.
        match candidate.rfind('/') {
            Some(last) => candidate[..last + 1] == *stem,
            None => false,
        }
    } else {
        trim_trailing_slash(granted) == trim_trailing_slash(candidate)
    }
}

fn trim_trailing_slash(path: &str) -> &str {
    path.strip_suffix('/').unwrap_or(path)
}

/// Host containment: exact match case-insensitively, absent-host and
/// "localhost" equivalent to each other, and wildcard grants ("*",
/// "*.example.com") containing everything under their suffix. No name
/// resolution is performed; containment is purely textual.
fn host_implies(granted: &str, candidate: &str) -> bool {
    let granted = granted.to_ascii_lowercase();
    let candidate = candidate.to_ascii_lowercase();

    let local = |host: &str| host.is_empty() || host == "localhost";
    if local(&granted) && local(&candidate) {
        return true;
    }
    if granted == candidate {
        return true;
    }
    if let Some(suffix) = granted.strip_prefix('*') {
        // "*" has an empty suffix and contains every host; "*.example.com"
        // contains any host ending in ".example.com".
        return candidate.ends_with(suffix);
    }
    false
}
