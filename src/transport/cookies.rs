//! Cookie jar persisted through a [`KeyValueStore`]
//!
//! Cookie-mode sessions live in an HTTP-only cookie the client never reads.
//! Storing the jar next to the session lets that cookie outlive the process.
//! Only `name=value` pairs are kept; domain and path attributes are ignored
//! since a client talks to a single API origin.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::cookie::CookieStore;
use reqwest::header::HeaderValue;
use reqwest::Url;

use crate::session::{KeyValueStore, COOKIE_JAR_KEY};

pub struct PersistentCookieJar {
    store: Arc<dyn KeyValueStore>,
    /// Serializes load-modify-save of the jar entry
    write_lock: Mutex<()>,
}

impl PersistentCookieJar {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Cookie name to value
    pub fn cookies_snapshot(&self) -> BTreeMap<String, String> {
        self.store
            .get(COOKIE_JAR_KEY)
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn save(&self, cookies: &BTreeMap<String, String>) {
        let result = if cookies.is_empty() {
            self.store.remove_all(&[COOKIE_JAR_KEY])
        } else {
            match serde_json::to_string(cookies) {
                Ok(raw) => self.store.put_all(&[(COOKIE_JAR_KEY, raw)]),
                Err(e) => Err(e.into()),
            }
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Failed to persist cookies");
        }
    }
}

impl CookieStore for PersistentCookieJar {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &HeaderValue>, _url: &Url) {
        let _guard = self.write_lock.lock();
        let mut cookies = self.cookies_snapshot();
        let mut changed = false;

        for header in cookie_headers {
            let Some(update) = header.to_str().ok().and_then(parse_set_cookie) else {
                continue;
            };
            match update {
                CookieUpdate::Set { name, value } => {
                    cookies.insert(name, value);
                }
                CookieUpdate::Remove { name } => {
                    cookies.remove(&name);
                }
            }
            changed = true;
        }

        if changed {
            self.save(&cookies);
        }
    }

    fn cookies(&self, _url: &Url) -> Option<HeaderValue> {
        let cookies = self.cookies_snapshot();
        if cookies.is_empty() {
            return None;
        }

        let header = cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ");
        HeaderValue::from_str(&header).ok()
    }
}

#[derive(Debug, PartialEq, Eq)]
enum CookieUpdate {
    Set { name: String, value: String },
    Remove { name: String },
}

/// Read a `Set-Cookie` header. An empty value or a non-positive `Max-Age`
/// deletes the cookie.
fn parse_set_cookie(header: &str) -> Option<CookieUpdate> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    let value = value.trim().trim_matches('"');

    let expired = parts.any(|attr| match attr.split_once('=') {
        Some((key, max_age)) if key.trim().eq_ignore_ascii_case("max-age") => {
            max_age.trim().parse::<i64>().map(|n| n <= 0).unwrap_or(false)
        }
        _ => false,
    });

    if value.is_empty() || expired {
        Some(CookieUpdate::Remove {
            name: name.to_string(),
        })
    } else {
        Some(CookieUpdate::Set {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{FileStore, MemoryStore};
    use tempfile::TempDir;

    fn url() -> Url {
        Url::parse("http://localhost:8080/api/v1/auth/login").unwrap()
    }

    fn set(jar: &PersistentCookieJar, headers: &[&str]) {
        let values: Vec<HeaderValue> = headers.iter().map(|h| HeaderValue::from_str(h).unwrap()).collect();
        jar.set_cookies(&mut values.iter(), &url());
    }

    #[test]
    fn test_parse_set_cookie() {
        assert_eq!(
            parse_set_cookie("ACCESS_TOKEN=abc.def; Path=/; HttpOnly; Max-Age=3600"),
            Some(CookieUpdate::Set {
                name: "ACCESS_TOKEN".to_string(),
                value: "abc.def".to_string()
            })
        );
        assert_eq!(
            parse_set_cookie("ACCESS_TOKEN=; Path=/; Max-Age=0"),
            Some(CookieUpdate::Remove {
                name: "ACCESS_TOKEN".to_string()
            })
        );
        assert_eq!(parse_set_cookie("garbage"), None);
    }

    #[test]
    fn test_replays_stored_cookies() {
        let jar = PersistentCookieJar::new(Arc::new(MemoryStore::new()));
        assert_eq!(jar.cookies(&url()), None);

        set(&jar, &["ACCESS_TOKEN=abc; HttpOnly", "theme=dark"]);

        let header = jar.cookies(&url()).unwrap();
        assert_eq!(header.to_str().unwrap(), "ACCESS_TOKEN=abc; theme=dark");

        set(&jar, &["theme=; Max-Age=0"]);
        assert_eq!(jar.cookies(&url()).unwrap().to_str().unwrap(), "ACCESS_TOKEN=abc");
    }

    #[test]
    fn test_cookies_survive_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");

        let jar = PersistentCookieJar::new(Arc::new(FileStore::open(&path)));
        set(&jar, &["ACCESS_TOKEN=abc; Path=/; HttpOnly"]);
        drop(jar);

        let reopened = PersistentCookieJar::new(Arc::new(FileStore::open(&path)));
        assert_eq!(
            reopened.cookies(&url()).unwrap().to_str().unwrap(),
            "ACCESS_TOKEN=abc"
        );
    }

    #[test]
    fn test_clearing_session_drops_cookies() {
        let kv = Arc::new(MemoryStore::new());
        let jar = PersistentCookieJar::new(kv.clone());
        let session = crate::session::SessionStore::new(kv, crate::session::SessionMode::Cookie);
        set(&jar, &["ACCESS_TOKEN=abc"]);
        session.mark_active(std::time::Duration::from_secs(600)).unwrap();

        session.clear_session();

        assert_eq!(jar.cookies(&url()), None);
        assert!(!session.is_valid());
    }
}
