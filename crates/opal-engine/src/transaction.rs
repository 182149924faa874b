//! Transactions: snapshot capture, rollback, and two-phase locking.
//!
//! A transaction acquires logical table locks through the database's lock
//! manager, snapshots each table's rows on first write, and delegates the
//! operation to the facade. All locks are released as a batch at commit or
//! rollback (strict two-phase locking). Dropping an active transaction
//! rolls it back.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use tracing::{info, warn};

use crate::database::Database;
use crate::error::{EngineError, Result};
use crate::lock::{LockMode, ResourceKind};
use crate::schema::{Column, Constraint};
use crate::table::{RowSet, SortKey};

/// Transaction isolation level.
///
/// All levels currently behave like `Serializable`: strict two-phase
/// locking with per-table locks held until commit. The weaker tags are
/// accepted so callers can record intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    /// Reads may observe uncommitted writes.
    ReadUncommitted,
    /// Reads observe only committed writes.
    ReadCommitted,
    /// Reads are repeatable within the transaction.
    RepeatableRead,
    /// Full serial equivalence (default).
    #[default]
    Serializable,
}

/// A table's captured state, restored on rollback.
///
/// An empty column list marks a table created inside the transaction;
/// rollback drops it instead of restoring rows.
#[derive(Debug, Clone)]
pub struct TableState {
    /// Case-preserving table name.
    pub table_name: String,
    /// Captured column schema.
    pub columns: Vec<Column>,
    /// Deep copy of the rows at capture time.
    pub rows: Vec<Vec<String>>,
}

/// An engine transaction bound to a database.
pub struct Transaction<'db> {
    db: &'db Database,
    id: u64,
    isolation: IsolationLevel,
    active: bool,
    table_states: HashMap<String, TableState>,
    shared_locks: HashSet<String>,
    exclusive_locks: HashSet<String>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            db,
            id: db.next_transaction_id(),
            isolation: IsolationLevel::default(),
            active: false,
            table_states: HashMap::new(),
            shared_locks: HashSet::new(),
            exclusive_locks: HashSet::new(),
        }
    }

    /// The transaction id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the transaction has begun and not yet terminated.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The isolation level tag.
    #[must_use]
    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    /// Sets the isolation level; only meaningful before `begin`.
    pub fn set_isolation_level(&mut self, level: IsolationLevel) {
        self.isolation = level;
    }

    /// Activates the transaction.
    ///
    /// # Errors
    ///
    /// Fails when the transaction is already active.
    pub fn begin(&mut self) -> Result<()> {
        if self.active {
            return Err(EngineError::Transaction(
                "transaction already active".to_string(),
            ));
        }
        self.active = true;
        info!(transaction_id = self.id, "transaction started");
        Ok(())
    }

    /// Commits: releases all locks and discards all snapshots.
    ///
    /// # Errors
    ///
    /// Fails when no transaction is active.
    pub fn commit(&mut self) -> Result<()> {
        if !self.active {
            return Err(EngineError::Transaction(
                "no active transaction to commit".to_string(),
            ));
        }
        self.release_locks();
        self.table_states.clear();
        self.active = false;
        info!(transaction_id = self.id, "transaction committed");
        Ok(())
    }

    /// Rolls back: restores every snapshotted table, releases all locks.
    ///
    /// # Errors
    ///
    /// Fails when no transaction is active.
    pub fn rollback(&mut self) -> Result<()> {
        if !self.active {
            return Err(EngineError::Transaction(
                "no active transaction to rollback".to_string(),
            ));
        }
        let states: Vec<TableState> = self.table_states.drain().map(|(_, s)| s).collect();
        for state in states {
            self.restore_table_state(&state);
        }
        self.release_locks();
        self.active = false;
        info!(transaction_id = self.id, "transaction rolled back");
        Ok(())
    }

    // DDL under transaction control

    /// Creates a table; rollback will drop it.
    ///
    /// # Errors
    ///
    /// Fails when inactive or when creation fails.
    pub fn create_table(
        &mut self,
        table_name: &str,
        columns: Vec<Column>,
        constraints: Vec<Constraint>,
    ) -> Result<()> {
        self.require_active()?;
        self.db.create_table(table_name, columns, constraints)?;
        self.lock_table_exclusive(table_name)?;
        // An empty column list marks the table as created here.
        self.table_states
            .entry(table_name.to_lowercase())
            .or_insert_with(|| TableState {
                table_name: table_name.to_string(),
                columns: Vec::new(),
                rows: Vec::new(),
            });
        Ok(())
    }

    /// Drops a table; rollback will recreate it and refill its rows.
    ///
    /// # Errors
    ///
    /// Fails when inactive, the table is unknown, or its lock cannot be
    /// acquired.
    pub fn drop_table(&mut self, table_name: &str) -> Result<()> {
        self.require_active()?;
        self.lock_table_exclusive(table_name)?;
        self.snapshot_if_needed(table_name)?;
        self.db.drop_table(table_name)
    }

    // DML write path

    /// Inserts rows under an exclusive lock, snapshotting on first touch.
    ///
    /// # Errors
    ///
    /// Fails when inactive, the lock is unavailable, or the insert fails.
    pub fn insert(&mut self, table_name: &str, rows: Vec<Vec<String>>) -> Result<usize> {
        self.require_active()?;
        self.lock_table_exclusive(table_name)?;
        self.snapshot_if_needed(table_name)?;
        self.db.insert(table_name, rows)
    }

    /// Updates rows under an exclusive lock, snapshotting on first touch.
    ///
    /// # Errors
    ///
    /// Fails when inactive, the lock is unavailable, or the update fails.
    pub fn update(
        &mut self,
        table_name: &str,
        updates: &[(String, String)],
        condition: &str,
    ) -> Result<usize> {
        self.require_active()?;
        self.lock_table_exclusive(table_name)?;
        self.snapshot_if_needed(table_name)?;
        self.db.update(table_name, updates, condition)
    }

    /// Deletes rows under an exclusive lock, snapshotting on first touch.
    ///
    /// # Errors
    ///
    /// Fails when inactive, the lock is unavailable, or the delete fails.
    pub fn delete(&mut self, table_name: &str, condition: &str) -> Result<usize> {
        self.require_active()?;
        self.lock_table_exclusive(table_name)?;
        self.snapshot_if_needed(table_name)?;
        self.db.delete(table_name, condition)
    }

    // Read path

    /// Evaluates a query under a shared lock (or the exclusive lock
    /// already held), observing the transaction's own writes.
    ///
    /// # Errors
    ///
    /// Fails when inactive, the lock is unavailable, or the query fails.
    pub fn select(
        &mut self,
        table_name: &str,
        select_columns: &[String],
        condition: &str,
        order_by: &[SortKey],
        group_by: &[String],
        having: &str,
    ) -> Result<RowSet> {
        self.require_active()?;
        self.lock_table_shared(table_name)?;
        self.db
            .select(table_name, select_columns, condition, order_by, group_by, having)
    }

    // Locking

    /// Acquires a shared lock on the table, unless an exclusive lock is
    /// already held.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown or the lock manager refuses.
    pub fn lock_table_shared(&mut self, table_name: &str) -> Result<()> {
        let key = table_name.to_lowercase();
        if self.exclusive_locks.contains(&key) || self.shared_locks.contains(&key) {
            return Ok(());
        }
        if !self.db.table_exists(table_name) {
            return Err(EngineError::unknown_table(table_name));
        }
        if !self
            .db
            .lock_manager()
            .acquire(self.id, &key, ResourceKind::Table, LockMode::Shared)
        {
            return Err(EngineError::LockNotAcquired {
                mode: "shared",
                resource: key,
            });
        }
        self.shared_locks.insert(key);
        Ok(())
    }

    /// Acquires an exclusive lock on the table, upgrading a held shared
    /// lock when possible.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown, the lock manager refuses, or the
    /// upgrade is rejected because other holders exist.
    pub fn lock_table_exclusive(&mut self, table_name: &str) -> Result<()> {
        let key = table_name.to_lowercase();
        if self.exclusive_locks.contains(&key) {
            return Ok(());
        }
        if !self.db.table_exists(table_name) {
            return Err(EngineError::unknown_table(table_name));
        }
        let upgrading = self.shared_locks.contains(&key);
        if !self
            .db
            .lock_manager()
            .acquire(self.id, &key, ResourceKind::Table, LockMode::Exclusive)
        {
            return Err(if upgrading {
                EngineError::UpgradeRejected(key)
            } else {
                EngineError::LockNotAcquired {
                    mode: "exclusive",
                    resource: key,
                }
            });
        }
        self.shared_locks.remove(&key);
        self.exclusive_locks.insert(key);
        Ok(())
    }

    /// Names of tables currently locked in shared mode.
    #[must_use]
    pub fn shared_lock_names(&self) -> Vec<String> {
        self.shared_locks.iter().cloned().collect()
    }

    /// Names of tables currently locked in exclusive mode.
    #[must_use]
    pub fn exclusive_lock_names(&self) -> Vec<String> {
        self.exclusive_locks.iter().cloned().collect()
    }

    /// Lowercased names of tables with a captured snapshot.
    #[must_use]
    pub fn snapshot_names(&self) -> Vec<String> {
        self.table_states.keys().cloned().collect()
    }

    fn require_active(&self) -> Result<()> {
        if self.active {
            Ok(())
        } else {
            Err(EngineError::Transaction(
                "no active transaction".to_string(),
            ))
        }
    }

    fn release_locks(&mut self) {
        self.db.lock_manager().release_all(self.id);
        self.shared_locks.clear();
        self.exclusive_locks.clear();
    }

    fn snapshot_if_needed(&mut self, table_name: &str) -> Result<()> {
        let Entry::Vacant(slot) = self.table_states.entry(table_name.to_lowercase()) else {
            return Ok(());
        };
        let arc = self
            .db
            .table_arc(table_name)
            .ok_or_else(|| EngineError::unknown_table(table_name))?;
        let table = arc.read();
        slot.insert(TableState {
            table_name: table.name().to_string(),
            columns: table.columns().to_vec(),
            rows: table.rows().to_vec(),
        });
        Ok(())
    }

    fn restore_table_state(&self, state: &TableState) {
        // A table created inside the transaction is simply dropped.
        if state.columns.is_empty() {
            if let Err(error) = self.db.drop_table(&state.table_name) {
                warn!(table = %state.table_name, %error, "rollback drop failed");
            }
            return;
        }

        match self.db.table_arc(&state.table_name) {
            Some(arc) => {
                arc.write().set_rows(state.rows.clone());
            }
            None => {
                // The table was dropped inside the transaction: recreate it
                // with the captured schema, then refill the rows.
                if let Err(error) =
                    self.db
                        .create_table(&state.table_name, state.columns.clone(), Vec::new())
                {
                    warn!(table = %state.table_name, %error, "rollback recreate failed");
                    return;
                }
                if let Some(arc) = self.db.table_arc(&state.table_name) {
                    arc.write().set_rows(state.rows.clone());
                }
            }
        }
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.active {
            warn!(
                transaction_id = self.id,
                "active transaction dropped; rolling back"
            );
            if let Err(error) = self.rollback() {
                warn!(transaction_id = self.id, %error, "implicit rollback failed");
            }
        }
    }
}
