//! Cache store client.
//!
//! The whole snapshot lives as one JSON string under one key in an
//! Upstash/Vercel KV REST endpoint (a thin HTTP front for Redis `GET` /
//! `SET`). Cache problems never reach callers: a failed `get` is a
//! miss, a failed `set` is a logged no-op, and missing credentials
//! degrade the store to a permanent miss instead of crashing.

use crate::error::AppError;
use crate::models::PriceSnapshot;
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Env vars holding the KV endpoint and bearer token, with the Upstash
/// integration's alternate names accepted as fallbacks.
const KV_URL_VARS: [&str; 2] = ["KV_REST_API_URL", "UPSTASH_REDIS_KV_REST_API_URL"];
const KV_TOKEN_VARS: [&str; 2] = ["KV_REST_API_TOKEN", "UPSTASH_REDIS_KV_REST_API_TOKEN"];

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|&name| std::env::var(name).ok())
        .filter(|v| !v.trim().is_empty())
}

/// REST client for the external KV store
pub struct KvClient {
    http: reqwest::Client,
    url: String,
    token: String,
}

impl KvClient {
    pub fn new(http: reqwest::Client, url: String, token: String) -> Self {
        Self { http, url, token }
    }

    /// POST one Redis-style command array, e.g. `["GET", key]`.
    /// Any transport or protocol problem comes back as a `StorageError`;
    /// callers downgrade it to miss / failed-write.
    async fn command(&self, args: Value) -> Result<Value, AppError> {
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&args)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("KV transport: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Storage(format!("KV HTTP {}", status.as_u16())));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::Storage(format!("KV bad json: {e}")))?;

        if let Some(err) = body.get("error").and_then(Value::as_str) {
            return Err(AppError::Storage(format!("KV error: {err}")));
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

/// In-memory store for tests (and the scheduler tests' single-flight
/// assertions): same whole-value-replacement semantics as the KV store.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryStore {
    entries: std::sync::Mutex<std::collections::HashMap<String, String>>,
}

/// The injected cache seam. `Disabled` is the missing-credentials
/// degradation: every read is a miss, every write a no-op, and the
/// service keeps answering by recomputing.
pub enum CacheStore {
    Kv(KvClient),
    Disabled,
    #[cfg(test)]
    Memory(MemoryStore),
}

impl CacheStore {
    pub fn from_env(http: &reqwest::Client) -> Self {
        match (env_first(&KV_URL_VARS), env_first(&KV_TOKEN_VARS)) {
            (Some(url), Some(token)) => CacheStore::Kv(KvClient::new(http.clone(), url, token)),
            _ => {
                warn!("KV credentials missing; cache disabled, every read recomputes");
                CacheStore::Disabled
            }
        }
    }

    #[cfg(test)]
    pub fn memory() -> Self {
        CacheStore::Memory(MemoryStore::default())
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, CacheStore::Disabled)
    }

    /// `GET key` + JSON decode. `None` on transport error, missing key,
    /// or a payload that no longer decodes - all of those just mean
    /// "recompute".
    pub async fn get_snapshot(&self, key: &str) -> Option<PriceSnapshot> {
        let payload = match self {
            CacheStore::Kv(kv) => match kv.command(json!(["GET", key])).await {
                Ok(result) => result,
                Err(e) => {
                    warn!(key, error = %e, "KV get failed, treating as miss");
                    return None;
                }
            },
            CacheStore::Disabled => return None,
            #[cfg(test)]
            CacheStore::Memory(mem) => {
                let entries = mem.entries.lock().unwrap();
                match entries.get(key) {
                    Some(s) => Value::String(s.clone()),
                    None => Value::Null,
                }
            }
        };

        decode_get_result(&payload)
    }

    /// `SET key payload`, whole-value replacement. Best-effort: the
    /// returned bool is informational, a failed write just means the
    /// next read recomputes.
    pub async fn set_snapshot(&self, key: &str, snapshot: &PriceSnapshot) -> bool {
        let payload = match serde_json::to_string(snapshot) {
            Ok(p) => p,
            Err(e) => {
                warn!(key, error = %e, "Snapshot did not serialize, skipping KV set");
                return false;
            }
        };

        match self {
            CacheStore::Kv(kv) => match kv.command(json!(["SET", key, payload])).await {
                Ok(_) => {
                    debug!(key, bytes = payload.len(), "Snapshot stored");
                    true
                }
                Err(e) => {
                    warn!(key, error = %e, "KV set failed (best-effort, continuing)");
                    false
                }
            },
            CacheStore::Disabled => false,
            #[cfg(test)]
            CacheStore::Memory(mem) => {
                mem.entries.lock().unwrap().insert(key.to_string(), payload);
                true
            }
        }
    }
}

/// The KV GET result must be a JSON string holding a snapshot document;
/// anything else (nil, integers, stale schema) is a miss.
fn decode_get_result(result: &Value) -> Option<PriceSnapshot> {
    let raw = result.as_str()?;
    match serde_json::from_str(raw) {
        Ok(snapshot) => Some(snapshot),
        Err(e) => {
            warn!(error = %e, "Cached payload did not decode, treating as miss");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn sample_snapshot() -> PriceSnapshot {
        PriceSnapshot {
            prices: BTreeMap::new(),
            averages: BTreeMap::new(),
            sources: vec![],
            last_update: Utc::now(),
            note: None,
        }
    }

    #[test]
    fn test_decode_rejects_non_string_results() {
        assert!(decode_get_result(&Value::Null).is_none());
        assert!(decode_get_result(&json!(42)).is_none());
        assert!(decode_get_result(&json!({"prices": {}})).is_none());
    }

    #[test]
    fn test_decode_rejects_corrupt_payload() {
        assert!(decode_get_result(&json!("not json at all")).is_none());
        assert!(decode_get_result(&json!("{\"prices\":")).is_none());
    }

    #[test]
    fn test_decode_accepts_stored_payload() {
        let payload = serde_json::to_string(&sample_snapshot()).unwrap();
        assert!(decode_get_result(&Value::String(payload)).is_some());
    }

    #[tokio::test]
    async fn test_disabled_store_is_permanent_miss() {
        let store = CacheStore::Disabled;
        assert!(!store.is_enabled());
        assert!(store.get_snapshot("fuel:prices").await.is_none());
        assert!(!store.set_snapshot("fuel:prices", &sample_snapshot()).await);
    }

    #[tokio::test]
    async fn test_memory_store_roundtrip_replaces_whole_value() {
        let store = CacheStore::memory();
        let first = sample_snapshot();
        assert!(store.set_snapshot("fuel:prices", &first).await);

        let mut second = sample_snapshot();
        second.note = Some("second".to_string());
        assert!(store.set_snapshot("fuel:prices", &second).await);

        let read = store.get_snapshot("fuel:prices").await.unwrap();
        assert_eq!(read.note.as_deref(), Some("second"));
    }
}
