//! Provenance ledger.
//!
//! - **Event store**: write-once events keyed by transaction id
//! - **Asset ledger**: asset records, lifecycle updates, history reconstruction
//! - **Lifecycle**: the stage transition table and the policy that applies it
//! - **Context**: transaction id, caller identity, and clock per operation

pub mod asset;
pub mod asset_ledger;
pub mod context;
pub mod event;
pub mod lifecycle;

pub use asset::{Asset, LifecycleStage, StorageModel, NAIVE_ASSET_PREFIX};
pub use asset_ledger::{
    AssetHistory, AssetLedger, HistoryEntry, MaterialCertification, ProductionCompletion,
    ProductionStart, QaCertification, SkippedEntry,
};
pub use context::{
    Clock, ContextFactory, FixedClock, SequentialTxIds, SystemClock, TxContext, TxIdSource,
    UuidTxIds,
};
pub use event::{event_key, EventStore, EventType, Evidence, ProvenanceEvent, EVENT_KEY_PREFIX};
pub use lifecycle::{initial_stage, LifecycleOperation, StagePolicy, QA_PASS_RESULT};
