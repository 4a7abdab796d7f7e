//! Audit entry persistence with table fallback
//!
//! Deployments that have not migrated to `comprehensive_audit_trail` still
//! carry one of the legacy tables. Each candidate is probed with a trial
//! SELECT; the first table that exists receives the entry. An insert that
//! fails on an existing table drops the entry rather than rerouting it.

use tracing::{debug, error, warn};

use crate::db::{table_exists, AuditRepository, AuditTable, DbPool};
use crate::models::AuditEntry;

/// Where an audit entry ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written { table: AuditTable },
    /// No candidate table exists, or the insert into the first existing
    /// one failed
    Dropped,
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written { .. })
    }
}

#[derive(Clone)]
pub struct AuditWriter {
    pool: DbPool,
}

impl AuditWriter {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Tables to try for `entry`, in order
    pub fn candidates(entry: &AuditEntry) -> Vec<AuditTable> {
        let is_admin = entry.user_role.map(|r| r.is_admin()).unwrap_or(false);
        if is_admin {
            vec![
                AuditTable::Comprehensive,
                AuditTable::AdminAuditLog,
                AuditTable::AuditTrail,
            ]
        } else {
            vec![AuditTable::Comprehensive, AuditTable::AuditTrail]
        }
    }

    /// Persist `entry`; never returns an error
    pub async fn write(&self, entry: &AuditEntry) -> WriteOutcome {
        let repo = AuditRepository::new(&self.pool);

        for table in Self::candidates(entry) {
            if !table_exists(&self.pool, table.name()).await {
                debug!(table = table.name(), "Audit table not present, trying next");
                continue;
            }

            return match repo.insert_into(table, entry).await {
                Ok(()) => WriteOutcome::Written { table },
                Err(e) => {
                    warn!(
                        table = table.name(),
                        action = %entry.action_type,
                        entry_id = %entry.id,
                        error = %e,
                        "Audit insert failed, entry dropped"
                    );
                    WriteOutcome::Dropped
                }
            };
        }

        error!(
            action = %entry.action_type,
            username = %entry.username,
            "Audit entry dropped: no audit table present"
        );
        WriteOutcome::Dropped
    }
}
