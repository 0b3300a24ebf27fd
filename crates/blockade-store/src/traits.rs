//! Store trait definitions

use blockade_api::{BlockPolicy, BlockedApp, Schedule};
use blockade_util::PackageId;
use std::collections::BTreeSet;

use crate::{AuditEvent, StoreResult};

/// Durable home of the block policy.
///
/// Every read returns a consistent point-in-time snapshot; writers are the
/// user-facing surface, the reader is the enforcement monitor.
pub trait PolicyStore: Send + Sync {
    // Policy

    /// Read the whole policy as one snapshot
    fn get_policy(&self) -> StoreResult<BlockPolicy>;

    /// Turn blocking on or off
    fn set_enabled(&self, enabled: bool) -> StoreResult<()>;

    /// Add a package to the blocked set. Returns false if it was already there.
    fn add_blocked(&self, package: &PackageId) -> StoreResult<bool>;

    /// Remove a package from the blocked set. Returns false if it was absent.
    fn remove_blocked(&self, package: &PackageId) -> StoreResult<bool>;

    /// Replace the blocked set; packages kept keep their added-at time
    fn set_blocked(&self, packages: &BTreeSet<PackageId>) -> StoreResult<()>;

    /// Set the daily window; `Schedule::Always` clears it
    fn set_schedule(&self, schedule: Schedule) -> StoreResult<()>;

    /// Blocked packages with the time they were added, ordered by package
    fn list_blocked(&self) -> StoreResult<Vec<BlockedApp>>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events, newest first
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;
}
