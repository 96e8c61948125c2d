//! Stored credentials
//!
//! Credentials are read from `~/.netrc`, keyed by the API host. Writing them
//! belongs to the login flow and is not done here.

use std::fs;
use std::path::Path;

use netrc_rs::Netrc;
use tracing::debug;

/// Source of a stored credential for a host
pub trait CredentialStore {
    fn credential(&self, host: &str) -> Option<String>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NetrcEntry {
    /// `None` for the `default` entry
    machine: Option<String>,
    password: Option<String>,
}

/// Read-only view of a `.netrc` file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetrcStore {
    entries: Vec<NetrcEntry>,
}

impl NetrcStore {
    /// Load `~/.netrc`; a missing or unreadable file yields an empty store
    pub fn from_home() -> Self {
        dirs::home_dir()
            .map(|home| Self::from_path(&home.join(".netrc")))
            .unwrap_or_default()
    }

    pub fn from_path(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(err) => {
                debug!(path = %path.display(), error = %err, "no netrc credentials");
                Self::default()
            }
        }
    }

    /// Parse netrc text; malformed content yields an empty store
    pub fn parse(content: &str) -> Self {
        let content: String = content
            .lines()
            .filter(|line| !line.trim_start().starts_with('#'))
            .flat_map(|line| [line, "\n"])
            .collect();

        match Netrc::parse(content, false) {
            Ok(netrc) => Self {
                entries: netrc
                    .machines
                    .into_iter()
                    .map(|machine| NetrcEntry {
                        machine: machine.name,
                        password: machine.password,
                    })
                    .collect(),
            },
            Err(err) => {
                debug!(error = ?err, "ignoring malformed netrc");
                Self::default()
            }
        }
    }

    fn entry(&self, host: &str) -> Option<&NetrcEntry> {
        let host = host_name(host);
        self.entries
            .iter()
            .find(|e| e.machine.as_deref() == Some(host))
            .or_else(|| self.entries.iter().find(|e| e.machine.is_none()))
    }
}

impl CredentialStore for NetrcStore {
    fn credential(&self, host: &str) -> Option<String> {
        self.entry(host).and_then(|e| e.password.clone())
    }
}

/// Host part of a configured API host (`https://apps.example.com/` -> `apps.example.com`)
fn host_name(host: &str) -> &str {
    let host = host
        .strip_prefix("https://")
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);
    host.split('/').next().unwrap_or(host)
}

/// Pick the authorization header value
///
/// Later sources win: the stored credential as a bearer token, then
/// `API_TOKEN` as a bearer token, then `API_AUTH` used verbatim.
pub fn resolve_authorization(
    stored: Option<&str>,
    api_token: Option<&str>,
    api_auth: Option<&str>,
) -> Option<String> {
    let mut authorization = stored.map(|password| format!("Bearer {password}"));
    if let Some(token) = api_token {
        authorization = Some(format!("Bearer {token}"));
    }
    if let Some(auth) = api_auth {
        authorization = Some(auth.to_string());
    }
    authorization
}
