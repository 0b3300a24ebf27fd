//! SQLite-based store implementation

use blockade_api::{BlockPolicy, BlockedApp, Schedule};
use blockade_util::PackageId;
use chrono::{DateTime, Local};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AuditEvent, AuditEventType, PolicyStore, StoreError, StoreResult};

/// How long a writer waits for another process holding the database lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-based store.
///
/// The service and the command-line tool open the same file; WAL mode lets the
/// monitor keep reading while a policy edit is being written.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    reserved: BTreeSet<PackageId>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        debug!(path = %path.display(), journal_mode = %mode, "Opened policy database");

        let store = Self {
            conn: Mutex::new(conn),
            reserved: BTreeSet::new(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
            reserved: BTreeSet::new(),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Packages that may never enter the blocked set (the interstitial itself)
    pub fn with_reserved(mut self, reserved: impl IntoIterator<Item = PackageId>) -> Self {
        self.reserved.extend(reserved);
        self
    }

    pub fn reserved(&self) -> &BTreeSet<PackageId> {
        &self.reserved
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Audit log (append-only)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            -- Policy settings (single row); schedule bounds are both set or both NULL
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                enabled INTEGER NOT NULL DEFAULT 1,
                schedule_start INTEGER CHECK (schedule_start BETWEEN 0 AND 1439),
                schedule_end INTEGER CHECK (schedule_end BETWEEN 0 AND 1439),
                CHECK ((schedule_start IS NULL) = (schedule_end IS NULL))
            );

            INSERT OR IGNORE INTO settings (id, enabled) VALUES (1, 1);

            -- Blocked set
            CREATE TABLE IF NOT EXISTS blocked_packages (
                package TEXT PRIMARY KEY,
                added_at TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }

    fn check_not_reserved(&self, package: &PackageId) -> StoreResult<()> {
        if self.reserved.contains(package) {
            return Err(StoreError::ReservedPackage(package.clone()));
        }
        Ok(())
    }
}

fn insert_audit(conn: &Connection, event: &AuditEvent) -> StoreResult<i64> {
    let event_json = serde_json::to_string(&event.event)?;

    conn.execute(
        "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
        params![event.timestamp.to_rfc3339(), event_json],
    )?;

    Ok(conn.last_insert_rowid())
}

fn parse_timestamp(s: &str) -> DateTime<Local> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Local))
        .unwrap_or_else(|_| blockade_util::now())
}

fn read_schedule(conn: &Connection) -> StoreResult<(bool, Schedule)> {
    let (enabled, start, end): (bool, Option<i32>, Option<i32>) = conn.query_row(
        "SELECT enabled, schedule_start, schedule_end FROM settings WHERE id = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
    )?;

    let schedule = Schedule::from_raw(start.unwrap_or(-1), end.unwrap_or(-1))?;
    Ok((enabled, schedule))
}

impl PolicyStore for SqliteStore {
    fn get_policy(&self) -> StoreResult<BlockPolicy> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let (enabled, schedule) = read_schedule(&tx)?;

        let mut blocked_packages = BTreeSet::new();
        {
            let mut stmt = tx.prepare("SELECT package FROM blocked_packages")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            for row in rows {
                let package = PackageId::new(row?);
                if self.reserved.contains(&package) {
                    warn!(package = %package, "Ignoring reserved package found in blocked set");
                    continue;
                }
                blocked_packages.insert(package);
            }
        }

        tx.commit()?;

        Ok(BlockPolicy {
            enabled,
            blocked_packages,
            schedule,
        })
    }

    fn set_enabled(&self, enabled: bool) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute("UPDATE settings SET enabled = ? WHERE id = 1", [enabled])?;
        insert_audit(
            &tx,
            &AuditEvent::new(AuditEventType::BlockingToggled { enabled }),
        )?;

        tx.commit()?;
        debug!(enabled, "Blocking toggled");
        Ok(())
    }

    fn add_blocked(&self, package: &PackageId) -> StoreResult<bool> {
        self.check_not_reserved(package)?;

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let inserted = tx.execute(
            "INSERT OR IGNORE INTO blocked_packages (package, added_at) VALUES (?, ?)",
            params![package.as_str(), blockade_util::now().to_rfc3339()],
        )? > 0;

        if inserted {
            insert_audit(
                &tx,
                &AuditEvent::new(AuditEventType::PackageBlocked {
                    package: package.clone(),
                }),
            )?;
        }

        tx.commit()?;
        debug!(package = %package, inserted, "Package blocked");
        Ok(inserted)
    }

    fn remove_blocked(&self, package: &PackageId) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM blocked_packages WHERE package = ?",
            [package.as_str()],
        )? > 0;

        if removed {
            insert_audit(
                &tx,
                &AuditEvent::new(AuditEventType::PackageUnblocked {
                    package: package.clone(),
                }),
            )?;
        }

        tx.commit()?;
        debug!(package = %package, removed, "Package unblocked");
        Ok(removed)
    }

    fn set_blocked(&self, packages: &BTreeSet<PackageId>) -> StoreResult<()> {
        for package in packages {
            self.check_not_reserved(package)?;
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let existing: Vec<String> = {
            let mut stmt = tx.prepare("SELECT package FROM blocked_packages")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            let packages = rows.collect::<Result<Vec<String>, _>>()?;
            packages
        };

        for old in existing {
            if !packages.contains(&PackageId::new(old.as_str())) {
                tx.execute("DELETE FROM blocked_packages WHERE package = ?", [old])?;
            }
        }

        let added_at = blockade_util::now().to_rfc3339();
        for package in packages {
            tx.execute(
                "INSERT OR IGNORE INTO blocked_packages (package, added_at) VALUES (?, ?)",
                params![package.as_str(), added_at],
            )?;
        }

        insert_audit(
            &tx,
            &AuditEvent::new(AuditEventType::BlockedSetReplaced {
                count: packages.len(),
            }),
        )?;

        tx.commit()?;
        debug!(count = packages.len(), "Blocked set replaced");
        Ok(())
    }

    fn set_schedule(&self, schedule: Schedule) -> StoreResult<()> {
        let (start, end) = match schedule.to_raw() {
            (-1, -1) => (None, None),
            (start, end) => (Some(start), Some(end)),
        };

        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "UPDATE settings SET schedule_start = ?, schedule_end = ? WHERE id = 1",
            params![start, end],
        )?;
        insert_audit(
            &tx,
            &AuditEvent::new(AuditEventType::ScheduleChanged { schedule }),
        )?;

        tx.commit()?;
        debug!(schedule = %schedule, "Schedule changed");
        Ok(())
    }

    fn list_blocked(&self) -> StoreResult<Vec<BlockedApp>> {
        let conn = self.conn()?;

        let mut stmt =
            conn.prepare("SELECT package, added_at FROM blocked_packages ORDER BY package")?;
        let rows = stmt.query_map([], |row| {
            let package: String = row.get(0)?;
            let added_at: String = row.get(1)?;
            Ok((package, added_at))
        })?;

        let mut apps = Vec::new();
        for row in rows {
            let (package, added_at) = row?;
            let package = PackageId::new(package);
            if self.reserved.contains(&package) {
                continue;
            }
            apps.push(BlockedApp {
                package,
                added_at: parse_timestamp(&added_at),
            });
        }

        Ok(apps)
    }

    fn append_audit(&self, mut event: AuditEvent) -> StoreResult<()> {
        let conn = self.conn()?;
        event.id = insert_audit(&conn, &event)?;
        debug!(event_id = event.id, "Audit event appended");

        Ok(())
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let id: i64 = row.get(0)?;
            let timestamp_str: String = row.get(1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp_str, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp_str, event_json) = row?;
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp: parse_timestamp(&timestamp_str),
                event,
            });
        }

        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockade_util::MinuteOfDay;

    fn pkg(s: &str) -> PackageId {
        PackageId::new(s)
    }

    #[test]
    fn fresh_store_has_default_policy() {
        let store = SqliteStore::in_memory().unwrap();
        assert_eq!(store.get_policy().unwrap(), BlockPolicy::default());
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStarted))
            .unwrap();
        store
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
            .unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, AuditEventType::ServiceStopped);
        assert_eq!(events[1].event, AuditEventType::ServiceStarted);

        assert_eq!(store.get_recent_audits(1).unwrap().len(), 1);
    }

    #[test]
    fn add_blocked_is_idempotent() {
        let store = SqliteStore::in_memory().unwrap();

        assert!(store.add_blocked(&pkg("com.x")).unwrap());
        let once = store.get_policy().unwrap();
        assert!(!store.add_blocked(&pkg("com.x")).unwrap());
        let twice = store.get_policy().unwrap();

        assert_eq!(once, twice);
        assert_eq!(twice.blocked_packages.len(), 1);
    }

    #[test]
    fn remove_after_add_restores_set() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_blocked(&pkg("com.a")).unwrap();
        let before = store.get_policy().unwrap().blocked_packages;

        store.add_blocked(&pkg("com.x")).unwrap();
        assert!(store.remove_blocked(&pkg("com.x")).unwrap());

        assert_eq!(store.get_policy().unwrap().blocked_packages, before);
        assert!(!store.remove_blocked(&pkg("com.x")).unwrap());
    }

    #[test]
    fn mutations_are_audited() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_blocked(&pkg("com.x")).unwrap();
        store.add_blocked(&pkg("com.x")).unwrap();
        store.set_enabled(false).unwrap();

        let events: Vec<_> = store
            .get_recent_audits(10)
            .unwrap()
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert_eq!(
            events,
            vec![
                AuditEventType::BlockingToggled { enabled: false },
                AuditEventType::PackageBlocked {
                    package: pkg("com.x")
                },
            ]
        );
    }

    #[test]
    fn enabled_flag_persists() {
        let store = SqliteStore::in_memory().unwrap();
        store.set_enabled(false).unwrap();
        assert!(!store.get_policy().unwrap().enabled);
        store.set_enabled(true).unwrap();
        assert!(store.get_policy().unwrap().enabled);
    }

    #[test]
    fn schedule_set_and_cleared() {
        let store = SqliteStore::in_memory().unwrap();
        let schedule = Schedule::daily(
            MinuteOfDay::from_hm(22, 0).unwrap(),
            MinuteOfDay::from_hm(6, 0).unwrap(),
        );

        store.set_schedule(schedule).unwrap();
        assert_eq!(store.get_policy().unwrap().schedule, schedule);

        store.set_schedule(Schedule::Always).unwrap();
        assert_eq!(store.get_policy().unwrap().schedule, Schedule::Always);
    }

    #[test]
    fn half_set_schedule_is_rejected_by_schema() {
        let store = SqliteStore::in_memory().unwrap();
        let conn = store.conn().unwrap();
        let result = conn.execute(
            "UPDATE settings SET schedule_start = 60, schedule_end = NULL WHERE id = 1",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn reserved_packages_are_refused() {
        let store = SqliteStore::in_memory()
            .unwrap()
            .with_reserved([pkg("swaynag")]);

        assert!(matches!(
            store.add_blocked(&pkg("swaynag")),
            Err(StoreError::ReservedPackage(_))
        ));

        let set: BTreeSet<_> = [pkg("com.x"), pkg("swaynag")].into_iter().collect();
        assert!(store.set_blocked(&set).is_err());
        assert!(store.get_policy().unwrap().blocked_packages.is_empty());
    }

    #[test]
    fn reserved_rows_are_filtered_on_read() {
        let store = SqliteStore::in_memory()
            .unwrap()
            .with_reserved([pkg("swaynag")]);
        {
            let conn = store.conn().unwrap();
            conn.execute(
                "INSERT INTO blocked_packages (package, added_at) VALUES ('swaynag', '2025-01-01T00:00:00+00:00')",
                [],
            )
            .unwrap();
        }
        store.add_blocked(&pkg("com.x")).unwrap();

        let policy = store.get_policy().unwrap();
        assert_eq!(policy.blocked_packages.len(), 1);
        assert!(policy.is_blocked(&pkg("com.x")));
        assert_eq!(store.list_blocked().unwrap().len(), 1);
    }

    #[test]
    fn set_blocked_keeps_added_at_of_survivors() {
        let store = SqliteStore::in_memory().unwrap();
        store.add_blocked(&pkg("com.a")).unwrap();
        store.add_blocked(&pkg("com.b")).unwrap();
        let original = store.list_blocked().unwrap()[0].clone();
        assert_eq!(original.package, pkg("com.a"));

        let set: BTreeSet<_> = [pkg("com.a"), pkg("com.c")].into_iter().collect();
        store.set_blocked(&set).unwrap();

        let listed = store.list_blocked().unwrap();
        let packages: Vec<_> = listed.iter().map(|a| a.package.clone()).collect();
        assert_eq!(packages, vec![pkg("com.a"), pkg("com.c")]);
        assert_eq!(listed[0].added_at, original.added_at);
    }

    #[test]
    fn file_store_is_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("blockade.db");

        let service = SqliteStore::open(&path).unwrap();
        let cli = SqliteStore::open(&path).unwrap();

        cli.add_blocked(&pkg("com.x")).unwrap();
        cli.set_enabled(false).unwrap();

        let policy = service.get_policy().unwrap();
        assert!(policy.is_blocked(&pkg("com.x")));
        assert!(!policy.enabled);
    }
}
