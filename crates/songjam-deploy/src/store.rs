use songjam_core::deployment::{DeploymentStatus, EmpireBuilderRecord};
use songjam_core::host::TokenSpec;
use songjam_core::ids::HostId;
use songjam_store::{EmpireRecordRepo, StoreError};

/// Record persistence as seen by the orchestrator.
pub trait RecordStore: Send + Sync {
    fn get_by_host(&self, host_id: &HostId) -> Result<Option<EmpireBuilderRecord>, StoreError>;
    fn get_or_create(&self, host_id: &HostId, token: &TokenSpec) -> Result<EmpireBuilderRecord, StoreError>;
    fn transition(&self, host_id: &HostId, next: DeploymentStatus) -> Result<EmpireBuilderRecord, StoreError>;
    fn record_token(&self, host_id: &HostId, token_address: &str, tx_hash: &str) -> Result<EmpireBuilderRecord, StoreError>;
    fn mark_deployed(&self, host_id: &HostId, empire_address: &str) -> Result<EmpireBuilderRecord, StoreError>;
    fn mark_failed(&self, host_id: &HostId, error: &str) -> Result<EmpireBuilderRecord, StoreError>;
}

impl RecordStore for EmpireRecordRepo {
    fn get_by_host(&self, host_id: &HostId) -> Result<Option<EmpireBuilderRecord>, StoreError> {
        EmpireRecordRepo::get_by_host(self, host_id)
    }

    fn get_or_create(&self, host_id: &HostId, token: &TokenSpec) -> Result<EmpireBuilderRecord, StoreError> {
        EmpireRecordRepo::get_or_create(self, host_id, token)
    }

    fn transition(&self, host_id: &HostId, next: DeploymentStatus) -> Result<EmpireBuilderRecord, StoreError> {
        EmpireRecordRepo::transition(self, host_id, next)
    }

    fn record_token(&self, host_id: &HostId, token_address: &str, tx_hash: &str) -> Result<EmpireBuilderRecord, StoreError> {
        EmpireRecordRepo::record_token(self, host_id, token_address, tx_hash)
    }

    fn mark_deployed(&self, host_id: &HostId, empire_address: &str) -> Result<EmpireBuilderRecord, StoreError> {
        EmpireRecordRepo::mark_deployed(self, host_id, empire_address)
    }

    fn mark_failed(&self, host_id: &HostId, error: &str) -> Result<EmpireBuilderRecord, StoreError> {
        EmpireRecordRepo::mark_failed(self, host_id, error)
    }
}
