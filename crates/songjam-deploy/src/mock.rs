//! Deterministic collaborators for exercising the orchestrators without
//! network access.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use songjam_core::deployment::{
    DeployedToken, DeploymentStatus, EmpireBuilderRecord, EmpireDeployment, TokenConfig,
};
use songjam_core::errors::UpstreamError;
use songjam_core::host::TokenSpec;
use songjam_core::ids::HostId;
use songjam_core::services::{
    EmpireDeployer, EmpireRequest, Room, RoomProvider, TokenConfigProvider, TokenConfigRequest,
    TokenDeployer,
};
use songjam_store::{Database, EmpireRecordRepo, StoreError};

use crate::store::RecordStore;

pub const MOCK_TOKEN_ADDRESS: &str = "0x1111111111111111111111111111111111111111";
pub const MOCK_EMPIRE_ADDRESS: &str = "0x2222222222222222222222222222222222222222";
pub const MOCK_TX_HASH: &str = "0xfeedface";

/// Returns the same programmed result on every call.
pub struct MockTokenConfigProvider {
    result: Result<TokenConfig, UpstreamError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<TokenConfigRequest>>,
}

impl MockTokenConfigProvider {
    pub fn ok() -> Self {
        Self::with_result(Ok(TokenConfig {
            signed_transaction: "0x02f8".into(),
            predicted_address: Some(MOCK_TOKEN_ADDRESS.into()),
            extra: Default::default(),
        }))
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(result: Result<TokenConfig, UpstreamError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<TokenConfigRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl TokenConfigProvider for MockTokenConfigProvider {
    async fn token_config(&self, request: &TokenConfigRequest) -> Result<TokenConfig, UpstreamError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock() = Some(request.clone());
        self.result.clone()
    }
}

pub struct MockTokenDeployer {
    result: Result<DeployedToken, UpstreamError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockTokenDeployer {
    pub fn ok() -> Self {
        Self {
            result: Ok(DeployedToken {
                token_address: MOCK_TOKEN_ADDRESS.into(),
                tx_hash: MOCK_TX_HASH.into(),
            }),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self {
            result: Err(error),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Succeeds after `delay`, like a receipt that takes a while to land.
    pub fn slow(delay: Duration) -> Self {
        Self { delay, ..Self::ok() }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TokenDeployer for MockTokenDeployer {
    async fn deploy_token(&self, _config: &TokenConfig) -> Result<DeployedToken, UpstreamError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

pub struct MockEmpireDeployer {
    result: Result<EmpireDeployment, UpstreamError>,
    calls: AtomicUsize,
    last_request: Mutex<Option<EmpireRequest>>,
}

impl MockEmpireDeployer {
    pub fn ok() -> Self {
        Self::with_result(Ok(EmpireDeployment {
            empire_address: MOCK_EMPIRE_ADDRESS.into(),
            tx_hash: None,
        }))
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self::with_result(Err(error))
    }

    fn with_result(result: Result<EmpireDeployment, UpstreamError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<EmpireRequest> {
        self.last_request.lock().clone()
    }
}

#[async_trait]
impl EmpireDeployer for MockEmpireDeployer {
    async fn deploy_empire(&self, request: &EmpireRequest) -> Result<EmpireDeployment, UpstreamError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock() = Some(request.clone());
        self.result.clone()
    }
}

pub struct MockRoomProvider {
    result: Result<Room, UpstreamError>,
    calls: AtomicUsize,
}

impl MockRoomProvider {
    pub fn ok() -> Self {
        Self {
            result: Ok(Room {
                name: "mock-room".into(),
                url: "https://songjam.daily.co/mock-room".into(),
            }),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: UpstreamError) -> Self {
        Self {
            result: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RoomProvider for MockRoomProvider {
    async fn create_room(&self, _name: Option<&str>) -> Result<Room, UpstreamError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.result.clone()
    }
}

/// In-memory SQLite store whose status writes can be switched off.
pub struct MockRecordStore {
    inner: EmpireRecordRepo,
    fail_writes: AtomicBool,
}

impl MockRecordStore {
    pub fn new() -> Result<Self, StoreError> {
        Ok(Self {
            inner: EmpireRecordRepo::new(Database::in_memory()?),
            fail_writes: AtomicBool::new(false),
        })
    }

    /// Make `transition`, `mark_deployed` and `mark_failed` error out.
    pub fn fail_status_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    pub fn repo(&self) -> &EmpireRecordRepo {
        &self.inner
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(StoreError::Database("simulated write failure".into()));
        }
        Ok(())
    }
}

impl RecordStore for MockRecordStore {
    fn get_by_host(&self, host_id: &HostId) -> Result<Option<EmpireBuilderRecord>, StoreError> {
        self.inner.get_by_host(host_id)
    }

    fn get_or_create(&self, host_id: &HostId, token: &TokenSpec) -> Result<EmpireBuilderRecord, StoreError> {
        self.inner.get_or_create(host_id, token)
    }

    fn transition(&self, host_id: &HostId, next: DeploymentStatus) -> Result<EmpireBuilderRecord, StoreError> {
        self.check()?;
        self.inner.transition(host_id, next)
    }

    fn record_token(&self, host_id: &HostId, token_address: &str, tx_hash: &str) -> Result<EmpireBuilderRecord, StoreError> {
        self.inner.record_token(host_id, token_address, tx_hash)
    }

    fn mark_deployed(&self, host_id: &HostId, empire_address: &str) -> Result<EmpireBuilderRecord, StoreError> {
        self.check()?;
        self.inner.mark_deployed(host_id, empire_address)
    }

    fn mark_failed(&self, host_id: &HostId, error: &str) -> Result<EmpireBuilderRecord, StoreError> {
        self.check()?;
        self.inner.mark_failed(host_id, error)
    }
}
