//! # Concurrent Identity Resolver
//!
//! Resolves a short identifier for the execution context that issued a log
//! call. The probe that produces the raw snapshot is pluggable; the default
//! one reads the current thread id. Extracted ids are cached by snapshot and
//! the whole cache is swapped out every `RESET_EVERY` calls so short-lived
//! contexts cannot grow it without bound.

use arc_swap::ArcSwap;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Structured field name carrying the identifier.
pub const IDENTITY_KEY: &str = "context_id";

/// Returned when a snapshot does not contain a recognizable id.
pub const UNKNOWN_ID: &str = "unknown";

pub const RESET_EVERY: u64 = 10_000;

/// Source of "who is running right now" information.
pub trait ContextProbe: Send + Sync {
    /// A cheap textual capture of the current execution context.
    fn snapshot(&self) -> String;

    /// Pulls the identifier out of a snapshot produced by `snapshot`.
    fn extract(&self, snapshot: &str) -> Option<String>;
}

/// Default probe: the OS thread running the call, rendered as `ThreadId(N)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadProbe;

impl ContextProbe for ThreadProbe {
    fn snapshot(&self) -> String {
        format!("{:?}", std::thread::current().id())
    }

    fn extract(&self, snapshot: &str) -> Option<String> {
        let start = snapshot.find('(')? + 1;
        let end = start + snapshot[start..].find(')')?;
        let id = &snapshot[start..end];
        if !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()) {
            Some(id.to_string())
        } else {
            None
        }
    }
}

pub struct IdentityResolver {
    probe: Arc<dyn ContextProbe>,
    cache: ArcSwap<DashMap<String, String>>,
    calls: AtomicU64,
}

impl IdentityResolver {
    pub fn new(probe: Arc<dyn ContextProbe>) -> Self {
        Self {
            probe,
            cache: ArcSwap::from_pointee(DashMap::new()),
            calls: AtomicU64::new(0),
        }
    }

    /// Identifier of the calling context, or `"unknown"`.
    pub fn resolve_id(&self) -> String {
        if self.calls.fetch_add(1, Ordering::Relaxed) % RESET_EVERY == 0 {
            self.cache.store(Arc::new(DashMap::new()));
        }

        let snapshot = self.probe.snapshot();
        let cache = self.cache.load();
        if let Some(id) = cache.get(&snapshot) {
            return id.value().clone();
        }

        match self.probe.extract(&snapshot) {
            Some(id) => {
                cache.insert(snapshot, id.clone());
                id
            }
            None => UNKNOWN_ID.to_string(),
        }
    }

    /// Number of cached snapshots in the live cache generation.
    pub fn cached_len(&self) -> usize {
        self.cache.load().len()
    }
}

impl Default for IdentityResolver {
    fn default() -> Self {
        Self::new(Arc::new(ThreadProbe))
    }
}

impl std::fmt::Debug for IdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityResolver")
            .field("cached", &self.cached_len())
            .field("calls", &self.calls.load(Ordering::Relaxed))
            .finish()
    }
}
