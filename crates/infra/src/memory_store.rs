//! In-process event store
//!
//! Mirrors the data structure server semantics the analytics rely on:
//! typed values per key, lazy expiry on access, sorted-set ranking with
//! member-descending tie order. Time is read from the tokio clock so tests
//! running with paused time can advance past TTLs.

use async_trait::async_trait;
use holocron_core::{EventStore, HolocronError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(HashMap<String, String>),
    SortedSet(HashMap<String, f64>),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Hash(_) => "hash",
            Value::SortedSet(_) => "sorted set",
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn new(value: Value) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Event store held in process memory
#[derive(Debug)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    available: AtomicBool,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulates the store going down or coming back.
    ///
    /// While unavailable every operation fails with `StoreUnavailable`.
    pub fn set_available(&self, available: bool) {
        if !available {
            warn!("Memory store marked unavailable");
        }
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Whether the store holds no live keys
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired key and returns how many were removed.
    ///
    /// Keys nobody reads again would otherwise stay in memory forever, so
    /// `set_ex` runs this on each snapshot write.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, remaining = entries.len(), "Purged expired keys");
        }
        removed
    }

    fn check_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(HolocronError::store_unavailable(
                "memory store is unavailable",
            ))
        }
    }

    /// Runs `f` against the live entry for `key`, dropping it first if expired
    fn with_entry<T>(&self, key: &str, f: impl FnOnce(Option<&mut Entry>) -> Result<T>) -> Result<T> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            debug!(key, "Expired key evicted");
            entries.remove(key);
        }

        f(entries.get_mut(key))
    }

    /// Like `with_entry` but creates the key with `init` when absent
    fn with_entry_or_insert<T>(
        &self,
        key: &str,
        init: impl FnOnce() -> Value,
        f: impl FnOnce(&mut Entry) -> Result<T>,
    ) -> Result<T> {
        self.check_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();

        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }

        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::new(init()));
        f(entry)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve inclusive, possibly negative range bounds against `len`
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len || stop < 0 {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

fn parse_integer(key: &str, raw: &str) -> Result<i64> {
    raw.parse::<i64>()
        .map_err(|_| HolocronError::wrong_type(key, "integer"))
}

#[async_trait]
impl EventStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn zincr_by(&self, key: &str, member: &str, delta: f64) -> Result<f64> {
        self.with_entry_or_insert(
            key,
            || Value::SortedSet(HashMap::new()),
            |entry| match &mut entry.value {
                Value::SortedSet(set) => {
                    let score = set.entry(member.to_string()).or_insert(0.0);
                    *score += delta;
                    Ok(*score)
                }
                other => Err(HolocronError::wrong_type(
                    key,
                    format!("sorted set, found {}", other.kind()),
                )),
            },
        )
    }

    async fn zrevrange_with_scores(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<(String, f64)>> {
        self.with_entry(key, |entry| {
            let Some(entry) = entry else {
                return Ok(Vec::new());
            };
            let Value::SortedSet(set) = &entry.value else {
                return Err(HolocronError::wrong_type(
                    key,
                    format!("sorted set, found {}", entry.value.kind()),
                ));
            };

            let mut ranked: Vec<(String, f64)> =
                set.iter().map(|(m, s)| (m.clone(), *s)).collect();
            ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| b.0.cmp(&a.0)));

            Ok(match resolve_range(ranked.len(), start, stop) {
                Some((from, to)) => ranked[from..=to].to_vec(),
                None => Vec::new(),
            })
        })
    }

    async fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        self.with_entry_or_insert(
            key,
            || Value::Hash(HashMap::new()),
            |entry| match &mut entry.value {
                Value::Hash(hash) => {
                    let current = match hash.get(field) {
                        Some(raw) => parse_integer(key, raw)?,
                        None => 0,
                    };
                    let next = current + delta;
                    hash.insert(field.to_string(), next.to_string());
                    Ok(next)
                }
                other => Err(HolocronError::wrong_type(
                    key,
                    format!("hash, found {}", other.kind()),
                )),
            },
        )
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.with_entry_or_insert(
            key,
            || Value::Hash(HashMap::new()),
            |entry| match &mut entry.value {
                Value::Hash(hash) => {
                    hash.insert(field.to_string(), value.to_string());
                    Ok(())
                }
                other => Err(HolocronError::wrong_type(
                    key,
                    format!("hash, found {}", other.kind()),
                )),
            },
        )
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(other) => Err(HolocronError::wrong_type(
                key,
                format!("hash, found {}", other.kind()),
            )),
        })
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        self.with_entry_or_insert(
            key,
            || Value::Str("0".to_string()),
            |entry| match &mut entry.value {
                Value::Str(raw) => {
                    let next = parse_integer(key, raw)? + 1;
                    *raw = next.to_string();
                    Ok(next)
                }
                other => Err(HolocronError::wrong_type(
                    key,
                    format!("string, found {}", other.kind()),
                )),
            },
        )
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entry(key, |entry| match entry.map(|e| &e.value) {
            None => Ok(None),
            Some(Value::Str(raw)) => Ok(Some(raw.clone())),
            Some(other) => Err(HolocronError::wrong_type(
                key,
                format!("string, found {}", other.kind()),
            )),
        })
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.check_available()?;
        let entry = Entry {
            value: Value::Str(value.to_string()),
            expires_at: Some(Instant::now() + ttl),
        };
        self.purge_expired();
        self.entries.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        self.with_entry(key, |entry| match entry {
            Some(entry) => {
                entry.expires_at = Some(Instant::now() + ttl);
                Ok(true)
            }
            None => Ok(false),
        })
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        self.with_entry(key, |entry| {
            Ok(entry
                .and_then(|e| e.expires_at)
                .map(|at| at.saturating_duration_since(Instant::now())))
        })
    }

    async fn del(&self, key: &str) -> Result<bool> {
        self.check_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .lock()
            .remove(key)
            .is_some_and(|e| !e.is_expired(now)))
    }

    async fn flush(&self) -> Result<()> {
        self.check_available()?;
        self.entries.lock().clear();
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.check_available()
    }
}
