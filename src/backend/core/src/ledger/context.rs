//! Transaction context: the identity, clock, and transaction id every ledger
//! operation runs under.
//!
//! These are passed explicitly rather than read from process state so that
//! tests can drive the ledger with deterministic ids and timestamps.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::{LedgerConfig, TxIdStrategy};

// ═══════════════════════════════════════════════════════════════════════════════
// Transaction Id Sources
// ═══════════════════════════════════════════════════════════════════════════════

/// Mints a fresh transaction id per call. Ids must never repeat.
pub trait TxIdSource: Send + Sync {
    fn next_tx_id(&self) -> String;
}

/// Random v4 UUIDs, hyphen-free.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTxIds;

impl TxIdSource for UuidTxIds {
    fn next_tx_id(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }
}

/// Zero-padded counter ids, e.g. `tx-00000001`.
#[derive(Debug)]
pub struct SequentialTxIds {
    prefix: String,
    next: AtomicU64,
}

impl SequentialTxIds {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl Default for SequentialTxIds {
    fn default() -> Self {
        Self::new("tx-")
    }
}

impl TxIdSource for SequentialTxIds {
    fn next_tx_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}{:08}", self.prefix, n)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Clocks
// ═══════════════════════════════════════════════════════════════════════════════

/// Source of write-time timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that starts at a fixed instant and advances by `step` per reading.
/// A zero step yields the same instant forever.
#[derive(Debug)]
pub struct FixedClock {
    start: DateTime<Utc>,
    step_millis: i64,
    ticks: AtomicI64,
}

impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self::stepping(at, chrono::Duration::zero())
    }

    pub fn stepping(start: DateTime<Utc>, step: chrono::Duration) -> Self {
        Self {
            start,
            step_millis: step.num_milliseconds(),
            ticks: AtomicI64::new(0),
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
        self.start + chrono::Duration::milliseconds(tick * self.step_millis)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Context
// ═══════════════════════════════════════════════════════════════════════════════

/// Everything the surrounding execution context supplies to one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxContext {
    pub tx_id: String,
    pub caller_identity: String,
    pub timestamp: DateTime<Utc>,
}

impl TxContext {
    pub fn new(
        tx_id: impl Into<String>,
        caller_identity: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            caller_identity: caller_identity.into(),
            timestamp,
        }
    }
}

/// Mints one [`TxContext`] per ledger call.
#[derive(Clone)]
pub struct ContextFactory {
    identity: String,
    tx_ids: Arc<dyn TxIdSource>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ContextFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextFactory")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl ContextFactory {
    /// UUID transaction ids and the system clock.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            tx_ids: Arc::new(UuidTxIds),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn from_config(config: &LedgerConfig) -> Self {
        let factory = Self::new(config.identity.clone());
        match config.tx_ids {
            TxIdStrategy::Uuid => factory,
            TxIdStrategy::Sequential => factory.with_tx_ids(SequentialTxIds::default()),
        }
    }

    pub fn with_tx_ids(mut self, source: impl TxIdSource + 'static) -> Self {
        self.tx_ids = Arc::new(source);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Start a new transaction.
    pub fn begin(&self) -> TxContext {
        TxContext {
            tx_id: self.tx_ids.next_tx_id(),
            caller_identity: self.identity.clone(),
            timestamp: self.clock.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_ids_are_unique() {
        let source = UuidTxIds;
        let ids: HashSet<String> = (0..1000).map(|_| source.next_tx_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_sequential_ids() {
        let source = SequentialTxIds::new("t");
        assert_eq!(source.next_tx_id(), "t00000001");
        assert_eq!(source.next_tx_id(), "t00000002");
    }

    #[test]
    fn test_stepping_clock() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::stepping(start, chrono::Duration::seconds(1));
        assert_eq!(clock.now(), start);
        assert_eq!(clock.now(), start + chrono::Duration::seconds(1));

        let fixed = FixedClock::new(start);
        assert_eq!(fixed.now(), fixed.now());
    }

    #[test]
    fn test_factory_begin() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let factory = ContextFactory::new("Org2MSP")
            .with_tx_ids(SequentialTxIds::new("tx"))
            .with_clock(FixedClock::new(start));

        let ctx = factory.begin();
        assert_eq!(ctx, TxContext::new("tx00000001", "Org2MSP", start));
        assert_eq!(factory.begin().tx_id, "tx00000002");
    }
}
