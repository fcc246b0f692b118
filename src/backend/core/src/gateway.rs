//! The call surface the benchmark harness and the HTTP layer drive.
//!
//! A gateway hides where the ledger runs: [`LocalGateway`] calls an in-process
//! [`AssetLedger`], while the CLI provides an HTTP implementation. Each call
//! mints its own transaction context.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::ledger::{
    Asset, AssetHistory, AssetLedger, ContextFactory, MaterialCertification, ProductionCompletion,
    ProductionStart, QaCertification, StagePolicy,
};
use crate::store::{InMemoryStore, StateStore};

/// Ledger operations as seen by an external caller.
#[async_trait]
pub trait ProvenanceGateway: Send + Sync {
    async fn certify_material(&self, request: MaterialCertification) -> Result<String>;

    async fn start_production(&self, request: ProductionStart) -> Result<String>;

    async fn complete_production(&self, request: ProductionCompletion) -> Result<String>;

    async fn qa_certify(&self, request: QaCertification) -> Result<String>;

    async fn read_asset(&self, asset_id: &str) -> Result<Asset>;

    async fn get_asset_history(&self, asset_id: &str) -> Result<AssetHistory>;

    async fn asset_exists(&self, asset_id: &str) -> Result<bool>;

    /// Release the underlying connection. Called once by the owner.
    async fn close(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Gateway over an in-process ledger.
#[derive(Debug, Clone)]
pub struct LocalGateway {
    ledger: AssetLedger,
    contexts: ContextFactory,
}

impl LocalGateway {
    pub fn new(ledger: AssetLedger, contexts: ContextFactory) -> Self {
        Self { ledger, contexts }
    }

    /// A fresh in-memory ledger, for local benchmarking and tests.
    pub fn in_memory(identity: impl Into<String>, policy: StagePolicy) -> Self {
        let store: Arc<dyn StateStore> = Arc::new(InMemoryStore::new());
        Self::new(AssetLedger::new(store, policy), ContextFactory::new(identity))
    }

    pub fn ledger(&self) -> &AssetLedger {
        &self.ledger
    }

    pub fn contexts(&self) -> &ContextFactory {
        &self.contexts
    }
}

#[async_trait]
impl ProvenanceGateway for LocalGateway {
    async fn certify_material(&self, request: MaterialCertification) -> Result<String> {
        self.ledger.certify_material(&self.contexts.begin(), request).await
    }

    async fn start_production(&self, request: ProductionStart) -> Result<String> {
        self.ledger.start_production(&self.contexts.begin(), request).await
    }

    async fn complete_production(&self, request: ProductionCompletion) -> Result<String> {
        self.ledger.complete_production(&self.contexts.begin(), request).await
    }

    async fn qa_certify(&self, request: QaCertification) -> Result<String> {
        self.ledger.qa_certify(&self.contexts.begin(), request).await
    }

    async fn read_asset(&self, asset_id: &str) -> Result<Asset> {
        self.ledger.read_asset(asset_id).await
    }

    async fn get_asset_history(&self, asset_id: &str) -> Result<AssetHistory> {
        self.ledger.get_asset_history(asset_id).await
    }

    async fn asset_exists(&self, asset_id: &str) -> Result<bool> {
        self.ledger.asset_exists(asset_id).await
    }

    async fn close(&self) -> Result<()> {
        self.ledger.store().close().await
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
