//! In-memory state store.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::StateStore;
use crate::error::{ProvenanceError, Result};

/// Operation counters for an [`InMemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub reads: u64,
    pub writes: u64,
    pub rejected_writes: u64,
}

/// A `DashMap`-backed store. Atomic primitives hold the shard lock for the
/// duration of the check and the write.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    entries: DashMap<String, Vec<u8>>,
    closed: AtomicBool,
    reads: AtomicU64,
    writes: AtomicU64,
    rejected_writes: AtomicU64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            rejected_writes: self.rejected_writes.load(Ordering::Relaxed),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(ProvenanceError::persistence("in-memory store is closed"));
        }
        Ok(())
    }

    fn record_write(&self, applied: bool) -> bool {
        if applied {
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.rejected_writes.fetch_add(1, Ordering::Relaxed);
        }
        applied
    }
}

#[async_trait]
impl StateStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.ensure_open()?;
        self.entries.insert(key.to_string(), value);
        self.record_write(true);
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, value: Vec<u8>) -> Result<bool> {
        self.ensure_open()?;
        let applied = match self.entries.entry(key.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        };
        Ok(self.record_write(applied))
    }

    async fn compare_and_put(&self, key: &str, expected: &[u8], value: Vec<u8>) -> Result<bool> {
        self.ensure_open()?;
        let applied = match self.entries.get_mut(key) {
            Some(mut current) if current.as_slice() == expected => {
                *current = value;
                true
            }
            _ => false,
        };
        Ok(self.record_write(applied))
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
