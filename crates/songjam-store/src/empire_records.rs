use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, instrument};

use songjam_core::deployment::{DeploymentStatus, EmpireBuilderRecord};
use songjam_core::host::TokenSpec;
use songjam_core::ids::{HostId, RecordId};

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers::{get, parse_enum};

const TABLE: &str = "empire_builders";
const COLUMNS: &str = "id, host_id, token_name, token_symbol, token_image, status, \
                       token_address, empire_address, tx_hash, last_error, attempts, \
                       created_at, updated_at";

/// Persistence for per-host deployment records.
///
/// Every status write goes through [`DeploymentStatus::can_transition_to`];
/// an illegal move is a [`StoreError::Conflict`] and leaves the row untouched.
#[derive(Clone)]
pub struct EmpireRecordRepo {
    db: Database,
}

impl EmpireRecordRepo {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    #[instrument(skip(self), fields(host_id = %host_id))]
    pub fn get_by_host(&self, host_id: &HostId) -> Result<Option<EmpireBuilderRecord>, StoreError> {
        self.db.with_conn(|conn| find(conn, host_id))
    }

    /// Return the host's record, creating a `pending` one on first use.
    #[instrument(skip(self, token), fields(host_id = %host_id, symbol = %token.symbol))]
    pub fn get_or_create(
        &self,
        host_id: &HostId,
        token: &TokenSpec,
    ) -> Result<EmpireBuilderRecord, StoreError> {
        self.db.with_conn(|conn| {
            if let Some(existing) = find(conn, host_id)? {
                return Ok(existing);
            }

            let id = RecordId::new();
            let now = Utc::now().to_rfc3339();
            conn.execute(
                "INSERT INTO empire_builders
                     (id, host_id, token_name, token_symbol, token_image, status, attempts, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?7)",
                rusqlite::params![
                    id.as_str(),
                    host_id.as_str(),
                    token.name,
                    token.symbol,
                    token.image_url,
                    DeploymentStatus::Pending.to_string(),
                    now,
                ],
            )?;
            debug!(record_id = %id, "created empire record");
            require(conn, host_id)
        })
    }

    /// Move to `next`. Entering `deploying` bumps the attempt count and
    /// clears the previous error.
    #[instrument(skip(self), fields(host_id = %host_id, next = %next))]
    pub fn transition(
        &self,
        host_id: &HostId,
        next: DeploymentStatus,
    ) -> Result<EmpireBuilderRecord, StoreError> {
        self.db.with_conn(|conn| {
            check_transition(conn, host_id, next)?;
            let entering = next == DeploymentStatus::Deploying;
            conn.execute(
                "UPDATE empire_builders
                 SET status = ?1,
                     attempts = attempts + ?2,
                     last_error = CASE WHEN ?3 THEN NULL ELSE last_error END,
                     updated_at = ?4
                 WHERE host_id = ?5",
                rusqlite::params![
                    next.to_string(),
                    u32::from(entering),
                    entering,
                    Utc::now().to_rfc3339(),
                    host_id.as_str(),
                ],
            )?;
            require(conn, host_id)
        })
    }

    /// Persist the confirmed token deployment. Only valid while `deploying`.
    #[instrument(skip(self), fields(host_id = %host_id))]
    pub fn record_token(
        &self,
        host_id: &HostId,
        token_address: &str,
        tx_hash: &str,
    ) -> Result<EmpireBuilderRecord, StoreError> {
        self.db.with_conn(|conn| {
            let current = require(conn, host_id)?;
            if current.status != DeploymentStatus::Deploying {
                return Err(StoreError::Conflict(format!(
                    "cannot record token for {host_id} while {}",
                    current.status
                )));
            }
            conn.execute(
                "UPDATE empire_builders SET token_address = ?1, tx_hash = ?2, updated_at = ?3 WHERE host_id = ?4",
                rusqlite::params![token_address, tx_hash, Utc::now().to_rfc3339(), host_id.as_str()],
            )?;
            require(conn, host_id)
        })
    }

    #[instrument(skip(self), fields(host_id = %host_id))]
    pub fn mark_deployed(
        &self,
        host_id: &HostId,
        empire_address: &str,
    ) -> Result<EmpireBuilderRecord, StoreError> {
        self.db.with_conn(|conn| {
            check_transition(conn, host_id, DeploymentStatus::Deployed)?;
            conn.execute(
                "UPDATE empire_builders
                 SET status = ?1, empire_address = ?2, last_error = NULL, updated_at = ?3
                 WHERE host_id = ?4",
                rusqlite::params![
                    DeploymentStatus::Deployed.to_string(),
                    empire_address,
                    Utc::now().to_rfc3339(),
                    host_id.as_str(),
                ],
            )?;
            require(conn, host_id)
        })
    }

    #[instrument(skip(self, error), fields(host_id = %host_id))]
    pub fn mark_failed(&self, host_id: &HostId, error: &str) -> Result<EmpireBuilderRecord, StoreError> {
        self.db.with_conn(|conn| {
            check_transition(conn, host_id, DeploymentStatus::Failed)?;
            conn.execute(
                "UPDATE empire_builders SET status = ?1, last_error = ?2, updated_at = ?3 WHERE host_id = ?4",
                rusqlite::params![
                    DeploymentStatus::Failed.to_string(),
                    error,
                    Utc::now().to_rfc3339(),
                    host_id.as_str(),
                ],
            )?;
            require(conn, host_id)
        })
    }
}

fn find(conn: &Connection, host_id: &HostId) -> Result<Option<EmpireBuilderRecord>, StoreError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM {TABLE} WHERE host_id = ?1"))?;
    let mut rows = stmt.query([host_id.as_str()])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_record(row)?)),
        None => Ok(None),
    }
}

fn require(conn: &Connection, host_id: &HostId) -> Result<EmpireBuilderRecord, StoreError> {
    find(conn, host_id)?.ok_or_else(|| StoreError::NotFound(format!("empire record for host {host_id}")))
}

fn check_transition(
    conn: &Connection,
    host_id: &HostId,
    next: DeploymentStatus,
) -> Result<EmpireBuilderRecord, StoreError> {
    let current = require(conn, host_id)?;
    if !current.status.can_transition_to(next) {
        return Err(StoreError::Conflict(format!(
            "illegal transition for {host_id}: {} -> {next}",
            current.status
        )));
    }
    Ok(current)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<EmpireBuilderRecord, StoreError> {
    let status: String = get(row, 5, TABLE, "status")?;
    Ok(EmpireBuilderRecord {
        id: RecordId::from_raw(get::<String>(row, 0, TABLE, "id")?),
        host_id: HostId::from_raw(get::<String>(row, 1, TABLE, "host_id")?),
        token_name: get(row, 2, TABLE, "token_name")?,
        token_symbol: get(row, 3, TABLE, "token_symbol")?,
        token_image: get(row, 4, TABLE, "token_image")?,
        status: parse_enum(&status, TABLE, "status")?,
        token_address: get(row, 6, TABLE, "token_address")?,
        empire_address: get(row, 7, TABLE, "empire_address")?,
        tx_hash: get(row, 8, TABLE, "tx_hash")?,
        last_error: get(row, 9, TABLE, "last_error")?,
        attempts: get(row, 10, TABLE, "attempts")?,
        created_at: get(row, 11, TABLE, "created_at")?,
        updated_at: get(row, 12, TABLE, "updated_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> EmpireRecordRepo {
        EmpireRecordRepo::new(Database::in_memory().unwrap())
    }

    fn token() -> TokenSpec {
        TokenSpec {
            name: "Songjam".into(),
            symbol: "JAM".into(),
            image_url: Some("https://img.example/jam.png".into()),
        }
    }

    fn host() -> HostId {
        HostId::from_raw("1489327651")
    }

    #[test]
    fn create_starts_pending() {
        let repo = repo();
        let record = repo.get_or_create(&host(), &token()).unwrap();
        assert!(record.id.as_str().starts_with("emp_"));
        assert_eq!(record.status, DeploymentStatus::Pending);
        assert_eq!(record.attempts, 0);
        assert_eq!(record.token_image.as_deref(), Some("https://img.example/jam.png"));
    }

    #[test]
    fn one_record_per_host() {
        let repo = repo();
        let a = repo.get_or_create(&host(), &token()).unwrap();
        let b = repo.get_or_create(&host(), &token()).unwrap();
        assert_eq!(a.id, b.id);
        let other = repo.get_or_create(&HostId::from_raw("7"), &token()).unwrap();
        assert_ne!(a.id, other.id);
    }

    #[test]
    fn duplicate_insert_rejected_by_unique_column() {
        let repo = repo();
        repo.get_or_create(&host(), &token()).unwrap();
        let result = repo.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO empire_builders (id, host_id, token_name, token_symbol, status, created_at, updated_at)
                 VALUES ('emp_x', ?1, 'n', 's', 'pending', 'now', 'now')",
                [host().as_str()],
            )?;
            Ok(())
        });
        assert!(result.is_err());
    }

    #[test]
    fn missing_host_is_none() {
        assert!(repo().get_by_host(&host()).unwrap().is_none());
    }

    #[test]
    fn happy_path_lifecycle() {
        let repo = repo();
        repo.get_or_create(&host(), &token()).unwrap();
        let deploying = repo.transition(&host(), DeploymentStatus::Deploying).unwrap();
        assert_eq!(deploying.attempts, 1);

        let with_token = repo.record_token(&host(), "0xaaa", "0xhash").unwrap();
        assert_eq!(with_token.token_address.as_deref(), Some("0xaaa"));
        assert_eq!(with_token.tx_hash.as_deref(), Some("0xhash"));

        let done = repo.mark_deployed(&host(), "0xbbb").unwrap();
        assert_eq!(done.status, DeploymentStatus::Deployed);
        assert_eq!(done.empire_address.as_deref(), Some("0xbbb"));
        assert_eq!(done.token_address.as_deref(), Some("0xaaa"));
    }

    #[test]
    fn deployed_is_terminal() {
        let repo = repo();
        repo.get_or_create(&host(), &token()).unwrap();
        repo.transition(&host(), DeploymentStatus::Deploying).unwrap();
        repo.mark_deployed(&host(), "0xbbb").unwrap();

        let err = repo.transition(&host(), DeploymentStatus::Deploying).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
        let err = repo.mark_failed(&host(), "late").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let record = repo.get_by_host(&host()).unwrap().unwrap();
        assert_eq!(record.status, DeploymentStatus::Deployed);
        assert!(record.last_error.is_none());
    }

    #[test]
    fn pending_cannot_jump_to_deployed() {
        let repo = repo();
        repo.get_or_create(&host(), &token()).unwrap();
        let err = repo.mark_deployed(&host(), "0xbbb").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn retry_edge_bumps_attempts_and_clears_error() {
        let repo = repo();
        repo.get_or_create(&host(), &token()).unwrap();
        repo.transition(&host(), DeploymentStatus::Deploying).unwrap();
        let failed = repo.mark_failed(&host(), "rpc down").unwrap();
        assert_eq!(failed.last_error.as_deref(), Some("rpc down"));

        let retry = repo.transition(&host(), DeploymentStatus::Deploying).unwrap();
        assert_eq!(retry.attempts, 2);
        assert!(retry.last_error.is_none());
    }

    #[test]
    fn record_token_requires_deploying() {
        let repo = repo();
        repo.get_or_create(&host(), &token()).unwrap();
        let err = repo.record_token(&host(), "0xaaa", "0xhash").unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn transition_unknown_host_is_not_found() {
        let err = repo()
            .transition(&host(), DeploymentStatus::Deploying)
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn corrupt_status_is_reported() {
        let repo = repo();
        repo.get_or_create(&host(), &token()).unwrap();
        repo.db
            .with_conn(|conn| {
                conn.execute("UPDATE empire_builders SET status = 'archived'", [])?;
                Ok(())
            })
            .unwrap();
        let err = repo.get_by_host(&host()).unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow { column: "status", .. }));
    }
}
