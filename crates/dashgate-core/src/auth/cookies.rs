//! Cookie jar for the server-managed refresh cookie.
//!
//! The API sets the refresh token as an http-only cookie. Client code never
//! reads it; this jar only replays whatever the server set, the same way a
//! browser does for `withCredentials` requests. Cookies are kept per host and
//! optionally persisted so a new process can still refresh its session.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::RwLock;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredCookie {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredCookie {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

type HostCookies = BTreeMap<String, StoredCookie>;

/// What a single `Set-Cookie` header asks for.
#[derive(Debug, PartialEq)]
enum CookieUpdate {
    Set {
        name: String,
        value: String,
        max_age: Option<i64>,
    },
    Remove {
        name: String,
    },
}

fn parse_set_cookie(header: &str) -> Option<CookieUpdate> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let max_age = parts.find_map(|attr| {
        let (key, val) = attr.split_once('=')?;
        if key.trim().eq_ignore_ascii_case("max-age") {
            val.trim().parse::<i64>().ok()
        } else {
            None
        }
    });

    if value.is_empty() || max_age.is_some_and(|age| age <= 0) {
        return Some(CookieUpdate::Remove {
            name: name.to_string(),
        });
    }

    Some(CookieUpdate::Set {
        name: name.to_string(),
        value: value.to_string(),
        max_age,
    })
}

#[derive(Debug, Default)]
pub struct PersistentCookieJar {
    path: Option<PathBuf>,
    hosts: RwLock<HashMap<String, HostCookies>>,
}

impl PersistentCookieJar {
    /// Jar that lives only as long as the client
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Jar backed by a JSON file; an unreadable file starts empty
    pub fn load(path: PathBuf) -> Self {
        let hosts = match Self::read_file(&path) {
            Ok(hosts) => hosts,
            Err(e) => {
                warn!(error = %e, "Failed to load cookie jar, starting empty");
                HashMap::new()
            }
        };
        Self {
            path: Some(path),
            hosts: RwLock::new(hosts),
        }
    }

    fn read_file(path: &PathBuf) -> Result<HashMap<String, HostCookies>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let contents = std::fs::read_to_string(path).context("Failed to read cookie jar")?;
        serde_json::from_str(&contents).context("Failed to parse cookie jar")
    }

    fn persist(&self, hosts: &HashMap<String, HostCookies>) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(hosts)?;
        std::fs::write(path, contents).context("Failed to write cookie jar")?;
        Ok(())
    }

    /// Drop every cookie for every host
    pub fn clear(&self) {
        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        hosts.clear();
        if let Err(e) = self.persist(&hosts) {
            warn!(error = %e, "Failed to persist cleared cookie jar");
        }
    }

    /// Whether a live cookie with this name is held for the URL's host
    pub fn contains(&self, url: &Url, name: &str) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let hosts = self.hosts.read().unwrap_or_else(|e| e.into_inner());
        hosts
            .get(host)
            .and_then(|cookies| cookies.get(name))
            .is_some_and(|cookie| !cookie.is_expired())
    }
}

impl CookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, url: &Url) {
        let Some(host) = url.host_str() else {
            return;
        };

        let updates: Vec<CookieUpdate> = cookie_headers
            .filter_map(|h| h.to_str().ok())
            .filter_map(parse_set_cookie)
            .collect();
        if updates.is_empty() {
            return;
        }

        let mut hosts = self.hosts.write().unwrap_or_else(|e| e.into_inner());
        let cookies = hosts.entry(host.to_string()).or_default();
        for update in updates {
            match update {
                CookieUpdate::Set {
                    name,
                    value,
                    max_age,
                } => {
                    debug!(host, cookie = %name, "Storing cookie");
                    let expires_at = max_age.map(|secs| Utc::now() + Duration::seconds(secs));
                    cookies.insert(name, StoredCookie { value, expires_at });
                }
                CookieUpdate::Remove { name } => {
                    debug!(host, cookie = %name, "Removing cookie");
                    cookies.remove(&name);
                }
            }
        }
        cookies.retain(|_, c| !c.is_expired());

        if let Err(e) = self.persist(&hosts) {
            warn!(error = %e, "Failed to persist cookie jar");
        }
    }

    fn cookies(&self, url: &Url) -> Option<HeaderValue> {
        let host = url.host_str()?;
        let hosts = self.hosts.read().unwrap_or_else(|e| e.into_inner());
        let header = hosts
            .get(host)?
            .iter()
            .filter(|(_, c)| !c.is_expired())
            .map(|(name, c)| format!("{}={}", name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        if header.is_empty() {
            return None;
        }
        HeaderValue::from_str(&header).ok()
    }
}
