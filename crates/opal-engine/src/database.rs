//! Database facade.
//!
//! Owns the table map, the metadata catalog, the foreign-key registry, the
//! lock manager, and the user registry. DDL is serialized under the
//! catalog mutex; DML takes the per-table reader/writer lock for the
//! duration of the operation. Multi-table operations acquire table locks
//! in case-insensitive lexicographic order of table names.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::auth::{Privilege, User};
use crate::catalog::{Catalog, TableInfo};
use crate::error::{EngineError, Result};
use crate::fk::ForeignKeyRegistry;
use crate::index::Index;
use crate::lock::LockManager;
use crate::predicate::parse_predicate;
use crate::schema::{Column, Constraint, ConstraintKind, DataType};
use crate::storage;
use crate::table::{self, JoinType, RowSet, SortKey, Table};
use crate::transaction::Transaction;

/// The in-memory database engine.
pub struct Database {
    tables: RwLock<HashMap<String, Arc<RwLock<Table>>>>,
    catalog: Mutex<Catalog>,
    fk_registry: ForeignKeyRegistry,
    lock_manager: LockManager,
    indexes: Mutex<HashMap<String, Index>>,
    users: Mutex<HashMap<String, User>>,
    next_transaction_id: AtomicU64,
}

impl Default for Database {
    fn default() -> Self {
        Self::new()
    }
}

impl Database {
    /// Creates an empty database.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            catalog: Mutex::new(Catalog::new()),
            fk_registry: ForeignKeyRegistry::new(),
            lock_manager: LockManager::new(),
            indexes: Mutex::new(HashMap::new()),
            users: Mutex::new(HashMap::new()),
            next_transaction_id: AtomicU64::new(1),
        }
    }

    /// The transaction lock manager.
    #[must_use]
    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    /// The foreign-key registry.
    #[must_use]
    pub fn fk_registry(&self) -> &ForeignKeyRegistry {
        &self.fk_registry
    }

    pub(crate) fn table_arc(&self, name: &str) -> Option<Arc<RwLock<Table>>> {
        self.tables.read().get(&name.to_lowercase()).cloned()
    }

    pub(crate) fn next_transaction_id(&self) -> u64 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed)
    }

    fn require_table(&self, name: &str) -> Result<Arc<RwLock<Table>>> {
        self.table_arc(name)
            .ok_or_else(|| EngineError::unknown_table(name))
    }

    /// Whether the named table exists.
    #[must_use]
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(&name.to_lowercase())
    }

    // DDL

    /// Creates a table.
    ///
    /// Every FOREIGN KEY constraint must reference an existing table;
    /// referencing and referenced tables are registered with the FK
    /// validator.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name, an invalid user-defined column type, or
    /// a dangling FK reference.
    pub fn create_table(
        &self,
        name: &str,
        columns: Vec<Column>,
        constraints: Vec<Constraint>,
    ) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if self.table_exists(name) || catalog.view_exists(name) {
            return Err(EngineError::duplicate("table", name));
        }
        for column in &columns {
            if let DataType::UserDefined(type_name) = &column.data_type {
                if !catalog.type_exists(type_name) {
                    return Err(EngineError::Schema(format!(
                        "unknown type '{type_name}' for column '{}'",
                        column.name
                    )));
                }
            }
        }
        for constraint in &constraints {
            if let ConstraintKind::ForeignKey {
                referenced_table, ..
            } = &constraint.kind
            {
                if !self.table_exists(referenced_table) {
                    return Err(EngineError::Schema(format!(
                        "foreign key '{}' references unknown table '{referenced_table}'",
                        constraint.name
                    )));
                }
            }
        }

        let mut table = Table::new(name);
        for column in columns {
            table.add_column(column)?;
        }
        for constraint in constraints {
            table.add_constraint(constraint)?;
        }

        catalog.add_table(name, table.columns().to_vec(), table.constraints().to_vec());

        let has_fk = table
            .constraints()
            .iter()
            .any(|c| matches!(c.kind, ConstraintKind::ForeignKey { .. }));
        let referenced: Vec<String> = table
            .constraints()
            .iter()
            .filter_map(|c| match &c.kind {
                ConstraintKind::ForeignKey {
                    referenced_table, ..
                } => Some(referenced_table.clone()),
                _ => None,
            })
            .collect();

        self.tables
            .write()
            .insert(name.to_lowercase(), Arc::new(RwLock::new(table)));

        if has_fk {
            self.register_fk_probes(name);
            for referenced_table in referenced {
                self.register_fk_probes(&referenced_table);
            }
        }

        info!(table = name, "table created");
        Ok(())
    }

    /// Drops a table, cascading catalog indexes and privileges, and
    /// unregistering it from the FK validator.
    ///
    /// # Errors
    ///
    /// Fails when the table does not exist.
    pub fn drop_table(&self, name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        let removed = self.tables.write().remove(&name.to_lowercase());
        if removed.is_none() {
            return Err(EngineError::unknown_table(name));
        }
        let doomed_indexes: Vec<String> = {
            let indexes = self.indexes.lock();
            indexes
                .iter()
                .filter(|(index_name, _)| {
                    catalog
                        .index_info(index_name)
                        .is_some_and(|info| info.table_name.eq_ignore_ascii_case(name))
                })
                .map(|(index_name, _)| index_name.clone())
                .collect()
        };
        catalog.remove_table(name);
        let mut indexes = self.indexes.lock();
        for index_name in doomed_indexes {
            indexes.remove(&index_name);
        }
        self.fk_registry.unregister_table(name);
        info!(table = name, "table dropped");
        Ok(())
    }

    /// Renames a table, rewriting dependent catalog references.
    ///
    /// # Errors
    ///
    /// Fails when the old name is unknown or the new name collides.
    pub fn rename_table(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if self.table_exists(new_name) || catalog.view_exists(new_name) {
            return Err(EngineError::duplicate("table", new_name));
        }
        let arc = {
            let mut tables = self.tables.write();
            let arc = tables
                .remove(&old_name.to_lowercase())
                .ok_or_else(|| EngineError::unknown_table(old_name))?;
            tables.insert(new_name.to_lowercase(), Arc::clone(&arc));
            arc
        };
        arc.write().set_name(new_name);
        catalog.rename_table(old_name, new_name);
        if self.fk_registry.is_registered(old_name) {
            self.fk_registry.unregister_table(old_name);
            self.register_fk_probes(new_name);
        }
        info!(old = old_name, new = new_name, "table renamed");
        Ok(())
    }

    /// Adds a column to a table.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown or the column name collides.
    pub fn alter_table_add_column(&self, table_name: &str, column: Column) -> Result<()> {
        let catalog = self.catalog.lock();
        let arc = self.require_table(table_name)?;
        {
            let mut table = arc.write();
            table.add_column(column)?;
        }
        self.sync_catalog_entry(catalog, &arc);
        self.refresh_fk_probes(table_name);
        Ok(())
    }

    /// Drops a column from a table.
    ///
    /// # Errors
    ///
    /// Fails when the table or column is unknown.
    pub fn alter_table_drop_column(&self, table_name: &str, column_name: &str) -> Result<()> {
        let catalog = self.catalog.lock();
        let arc = self.require_table(table_name)?;
        {
            let mut table = arc.write();
            table.drop_column(column_name)?;
        }
        self.sync_catalog_entry(catalog, &arc);
        self.refresh_fk_probes(table_name);
        Ok(())
    }

    /// Renames a column.
    ///
    /// # Errors
    ///
    /// Fails when the table or column is unknown, or the new name
    /// collides.
    pub fn alter_table_rename_column(
        &self,
        table_name: &str,
        old_name: &str,
        new_name: &str,
    ) -> Result<()> {
        let catalog = self.catalog.lock();
        let arc = self.require_table(table_name)?;
        {
            let mut table = arc.write();
            table.rename_column(old_name, new_name)?;
        }
        self.sync_catalog_entry(catalog, &arc);
        self.refresh_fk_probes(table_name);
        Ok(())
    }

    /// Adds a constraint to a table.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown, the constraint name collides, or
    /// an FK references an unknown table.
    pub fn alter_table_add_constraint(&self, table_name: &str, constraint: Constraint) -> Result<()> {
        let catalog = self.catalog.lock();
        let referenced = match &constraint.kind {
            ConstraintKind::ForeignKey {
                referenced_table, ..
            } => {
                if !self.table_exists(referenced_table) {
                    return Err(EngineError::Schema(format!(
                        "foreign key '{}' references unknown table '{referenced_table}'",
                        constraint.name
                    )));
                }
                Some(referenced_table.clone())
            }
            _ => None,
        };
        let arc = self.require_table(table_name)?;
        {
            let mut table = arc.write();
            table.add_constraint(constraint)?;
        }
        self.sync_catalog_entry(catalog, &arc);
        if let Some(referenced_table) = referenced {
            self.register_fk_probes(table_name);
            self.register_fk_probes(&referenced_table);
        }
        Ok(())
    }

    /// Drops a constraint from a table.
    ///
    /// # Errors
    ///
    /// Fails when the table or constraint is unknown.
    pub fn alter_table_drop_constraint(
        &self,
        table_name: &str,
        constraint_name: &str,
    ) -> Result<()> {
        let catalog = self.catalog.lock();
        let arc = self.require_table(table_name)?;
        {
            let mut table = arc.write();
            table.drop_constraint(constraint_name)?;
        }
        self.sync_catalog_entry(catalog, &arc);
        Ok(())
    }

    /// Removes every row from a table.
    ///
    /// # Errors
    ///
    /// Fails when the table does not exist.
    pub fn truncate_table(&self, name: &str) -> Result<()> {
        let arc = self.require_table(name)?;
        arc.write().clear_rows();
        info!(table = name, "table truncated");
        Ok(())
    }

    /// Table metadata for DESCRIBE.
    ///
    /// # Errors
    ///
    /// Fails when the table does not exist.
    pub fn describe_table(&self, name: &str) -> Result<TableInfo> {
        self.catalog
            .lock()
            .table_info(name)
            .cloned()
            .ok_or_else(|| EngineError::unknown_table(name))
    }

    /// All table names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        self.catalog.lock().table_names()
    }

    fn sync_catalog_entry(
        &self,
        mut catalog: parking_lot::MutexGuard<'_, Catalog>,
        arc: &Arc<RwLock<Table>>,
    ) {
        let table = arc.read();
        catalog.update_table(
            table.name(),
            table.columns().to_vec(),
            table.constraints().to_vec(),
        );
    }

    fn register_fk_probes(&self, name: &str) {
        let Some(arc) = self.table_arc(name) else {
            return;
        };
        let columns = arc.read().column_names();
        let exists_arc = Arc::clone(&arc);
        let rows_arc = Arc::clone(&arc);
        self.fk_registry.register_table(
            name,
            columns,
            Box::new(move |column, value| {
                let table = exists_arc.read();
                table.column_index(column).is_some_and(|idx| {
                    table
                        .rows()
                        .iter()
                        .any(|row| row.get(idx).map(String::as_str) == Some(value))
                })
            }),
            Box::new(move || rows_arc.read().rows().to_vec()),
        );
    }

    /// Re-registers FK probes after a schema change, keeping the recorded
    /// column list in step.
    fn refresh_fk_probes(&self, name: &str) {
        if self.fk_registry.is_registered(name) {
            self.register_fk_probes(name);
        }
    }

    // DML

    /// Inserts rows, validating constraints per row. Returns the number
    /// inserted.
    ///
    /// # Errors
    ///
    /// Fails on the first invalid row; earlier rows stay inserted.
    pub fn insert(&self, table_name: &str, rows: Vec<Vec<String>>) -> Result<usize> {
        let arc = self.require_table(table_name)?;
        let mut table = arc.write();
        let mut inserted = 0;
        for row in rows {
            table.add_row(row, &self.fk_registry)?;
            inserted += 1;
        }
        debug!(table = table_name, inserted, "rows inserted");
        Ok(inserted)
    }

    /// Evaluates a single-table query.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown or the query does not parse.
    pub fn select(
        &self,
        table_name: &str,
        select_columns: &[String],
        condition: &str,
        order_by: &[SortKey],
        group_by: &[String],
        having: &str,
    ) -> Result<RowSet> {
        let arc = self.require_table(table_name)?;
        let table = arc.read();
        table.select_rows(select_columns, condition, order_by, group_by, having)
    }

    /// Updates matching rows. Returns the number updated.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown, the condition does not parse, or
    /// a rewritten row violates a constraint.
    pub fn update(
        &self,
        table_name: &str,
        updates: &[(String, String)],
        condition: &str,
    ) -> Result<usize> {
        let arc = self.require_table(table_name)?;
        let mut table = arc.write();
        let updated = table.update_rows(updates, condition, &self.fk_registry)?;
        debug!(table = table_name, updated, "rows updated");
        Ok(updated)
    }

    /// Deletes matching rows, enforcing referential integrity.
    ///
    /// Rows in other tables that reference a deleted row are removed when
    /// the constraint carries ON DELETE CASCADE, and block the delete
    /// otherwise. Returns the number of rows deleted from the target
    /// table.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown, the condition does not parse, or
    /// a non-cascading reference would be broken.
    pub fn delete(&self, table_name: &str, condition: &str) -> Result<usize> {
        // Collect FK constraints in other tables that point at the target.
        let referencing: Vec<(String, Constraint)> = {
            let catalog = self.catalog.lock();
            catalog
                .table_names()
                .iter()
                .filter_map(|other| catalog.table_info(other))
                .flat_map(|info| {
                    info.constraints
                        .iter()
                        .filter(|c| {
                            matches!(
                                &c.kind,
                                ConstraintKind::ForeignKey { referenced_table, .. }
                                    if referenced_table.eq_ignore_ascii_case(table_name)
                            )
                        })
                        .map(|c| (info.name.clone(), c.clone()))
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        // Lock the target and every referencing table in case-insensitive
        // lexicographic order.
        let mut lock_names: Vec<String> = referencing.iter().map(|(t, _)| t.clone()).collect();
        lock_names.push(table_name.to_string());
        lock_names.sort_by_key(|n| n.to_lowercase());
        lock_names.dedup_by(|a, b| a.eq_ignore_ascii_case(b));

        let arcs: Vec<(String, Arc<RwLock<Table>>)> = lock_names
            .iter()
            .map(|n| Ok((n.clone(), self.require_table(n)?)))
            .collect::<Result<_>>()?;
        let mut guards: HashMap<String, parking_lot::RwLockWriteGuard<'_, Table>> = arcs
            .iter()
            .map(|(n, arc)| (n.to_lowercase(), arc.write()))
            .collect();

        let target_key = table_name.to_lowercase();

        // Work out which rows the condition removes.
        let (doomed, target_columns) = {
            let target = &guards[&target_key];
            let expr = parse_predicate(condition)?;
            let columns = target.column_names();
            let doomed: Vec<Vec<String>> = target
                .rows()
                .iter()
                .filter(|row| expr.evaluate(row, &columns))
                .cloned()
                .collect();
            (doomed, columns)
        };
        if doomed.is_empty() {
            return Ok(0);
        }

        // Check every referencing constraint before touching anything.
        for (child_name, constraint) in &referencing {
            let ConstraintKind::ForeignKey {
                referenced_columns,
                cascade_delete,
                ..
            } = &constraint.kind
            else {
                continue;
            };
            let child = &guards[&child_name.to_lowercase()];
            let matches = referencing_rows(
                child,
                constraint,
                referenced_columns,
                &doomed,
                &target_columns,
            )?;
            if !matches.is_empty() && !*cascade_delete {
                return Err(EngineError::constraint(
                    constraint.name.clone(),
                    format!("rows in '{child_name}' reference deleted rows"),
                ));
            }
        }

        // Cascade: remove referencing rows, then the target rows.
        for (child_name, constraint) in &referencing {
            let ConstraintKind::ForeignKey {
                referenced_columns, ..
            } = &constraint.kind
            else {
                continue;
            };
            let child_key = child_name.to_lowercase();
            let matches = {
                let child = &guards[&child_key];
                referencing_rows(child, constraint, referenced_columns, &doomed, &target_columns)?
            };
            let Some(child) = guards.get_mut(&child_key) else {
                continue;
            };
            if !matches.is_empty() {
                let rows: Vec<Vec<String>> = child
                    .rows()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| !matches.contains(i))
                    .map(|(_, row)| row.clone())
                    .collect();
                let removed = child.row_count() - rows.len();
                child.set_rows(rows);
                debug!(table = %child_name, removed, "cascade delete");
            }
        }

        let Some(target) = guards.get_mut(&target_key) else {
            return Ok(0);
        };
        let expr = parse_predicate(condition)?;
        let columns = target.column_names();
        let rows: Vec<Vec<String>> = target
            .rows()
            .iter()
            .filter(|row| !expr.evaluate(row, &columns))
            .cloned()
            .collect();
        let deleted = target.row_count() - rows.len();
        target.set_rows(rows);
        debug!(table = table_name, deleted, "rows deleted");
        Ok(deleted)
    }

    /// Joins two tables, taking their read locks in lexicographic order.
    ///
    /// # Errors
    ///
    /// Fails when either table is unknown or the join query is invalid.
    pub fn join_tables(
        &self,
        left_name: &str,
        right_name: &str,
        join_type: JoinType,
        condition: &str,
        select_columns: &[String],
    ) -> Result<RowSet> {
        let left_arc = self.require_table(left_name)?;
        let right_arc = self.require_table(right_name)?;

        // Self-join: one lock, one snapshot.
        if left_name.eq_ignore_ascii_case(right_name) {
            let snapshot = left_arc.read().clone();
            return table::join(&snapshot, &snapshot, join_type, condition, select_columns);
        }

        let left_first = left_name.to_lowercase() <= right_name.to_lowercase();
        let (first, second) = if left_first {
            (&left_arc, &right_arc)
        } else {
            (&right_arc, &left_arc)
        };
        let first_guard = first.read();
        let second_guard = second.read();
        let (left, right) = if left_first {
            (&*first_guard, &*second_guard)
        } else {
            (&*second_guard, &*first_guard)
        };

        table::join(left, right, join_type, condition, select_columns)
    }

    /// Applies a set operation to two result tables.
    ///
    /// # Errors
    ///
    /// Fails on an unknown operation name or a column-count mismatch.
    pub fn set_operation(&self, operation: &str, left: &RowSet, right: &RowSet) -> Result<RowSet> {
        match operation.to_uppercase().as_str() {
            "UNION" => table::set_union(left, right, false),
            "UNION ALL" => table::set_union(left, right, true),
            "INTERSECT" => table::set_intersect(left, right),
            "EXCEPT" => table::set_except(left, right),
            other => Err(EngineError::Schema(format!(
                "unknown set operation '{other}'"
            ))),
        }
    }

    /// UPSERT semantics for MERGE and REPLACE: rows are matched on the
    /// table's PRIMARY KEY columns; a matching row is updated in place,
    /// anything else is inserted. Returns `(inserted, updated)`.
    ///
    /// # Errors
    ///
    /// Fails when the table is unknown, a row has the wrong arity, or a
    /// written row violates a constraint.
    pub fn upsert(&self, table_name: &str, rows: Vec<Vec<String>>) -> Result<(usize, usize)> {
        let arc = self.require_table(table_name)?;
        let mut table = arc.write();

        let key_indices: Vec<usize> = {
            let key_columns = table
                .constraints()
                .iter()
                .find(|c| c.kind == ConstraintKind::PrimaryKey)
                .map(|c| c.columns.clone())
                .unwrap_or_default();
            key_columns
                .iter()
                .filter_map(|name| table.column_index(name))
                .collect()
        };

        let mut inserted = 0;
        let mut updated = 0;
        for row in rows {
            if row.len() != table.columns().len() {
                return Err(EngineError::Schema(format!(
                    "table '{table_name}' expects {} values, got {}",
                    table.columns().len(),
                    row.len()
                )));
            }
            let existing = if key_indices.is_empty() {
                None
            } else {
                table.rows().iter().position(|candidate| {
                    key_indices
                        .iter()
                        .all(|&i| candidate.get(i) == row.get(i))
                })
            };
            match existing {
                Some(ordinal) => {
                    table.validate_row(&row, &self.fk_registry, Some(ordinal))?;
                    let mut rows = table.rows().to_vec();
                    rows[ordinal] = row;
                    table.set_rows(rows);
                    updated += 1;
                }
                None => {
                    table.add_row(row, &self.fk_registry)?;
                    inserted += 1;
                }
            }
        }
        debug!(table = table_name, inserted, updated, "upsert applied");
        Ok((inserted, updated))
    }

    // Views

    /// Records a view definition.
    ///
    /// # Errors
    ///
    /// Fails when the name collides with a table or view.
    pub fn create_view(&self, name: &str, definition: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if self.table_exists(name) || catalog.view_exists(name) {
            return Err(EngineError::duplicate("view", name));
        }
        catalog.add_view(name, definition, false);
        info!(view = name, "view created");
        Ok(())
    }

    /// Drops a view.
    ///
    /// # Errors
    ///
    /// Fails when the view does not exist.
    pub fn drop_view(&self, name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if !catalog.view_exists(name) {
            return Err(EngineError::Schema(format!("view '{name}' does not exist")));
        }
        catalog.remove_view(name);
        Ok(())
    }

    /// The defining query of a view; the statement layer re-executes it.
    ///
    /// # Errors
    ///
    /// Fails when the view does not exist.
    pub fn view_definition(&self, name: &str) -> Result<String> {
        self.catalog
            .lock()
            .view_info(name)
            .map(|info| info.definition.clone())
            .ok_or_else(|| EngineError::Schema(format!("view '{name}' does not exist")))
    }

    /// All view names, sorted.
    #[must_use]
    pub fn view_names(&self) -> Vec<String> {
        self.catalog.lock().view_names()
    }

    // User-defined types

    /// Records a user-defined composite type.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name.
    pub fn create_type(&self, name: &str, attributes: Vec<(String, String)>) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if catalog.type_exists(name) {
            return Err(EngineError::duplicate("type", name));
        }
        catalog.add_type(name, attributes);
        Ok(())
    }

    /// Drops a user-defined type.
    ///
    /// # Errors
    ///
    /// Fails when the type does not exist.
    pub fn drop_type(&self, name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if !catalog.type_exists(name) {
            return Err(EngineError::Schema(format!("type '{name}' does not exist")));
        }
        catalog.remove_type(name);
        Ok(())
    }

    // Assertions

    /// Records an assertion after checking its condition parses.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate name or an unparsable condition.
    pub fn create_assertion(&self, name: &str, condition: &str) -> Result<()> {
        parse_predicate(condition)?;
        let mut catalog = self.catalog.lock();
        if catalog.assertion_exists(name) {
            return Err(EngineError::duplicate("assertion", name));
        }
        catalog.add_assertion(name, condition);
        Ok(())
    }

    /// Drops an assertion.
    ///
    /// # Errors
    ///
    /// Fails when the assertion does not exist.
    pub fn drop_assertion(&self, name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if !catalog.assertion_exists(name) {
            return Err(EngineError::Schema(format!(
                "assertion '{name}' does not exist"
            )));
        }
        catalog.remove_assertion(name);
        Ok(())
    }

    // Indexes

    /// Creates and builds an equality index over one column.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate index name or an unknown table/column.
    pub fn create_index(&self, index_name: &str, table_name: &str, column_name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if catalog.index_exists(index_name) {
            return Err(EngineError::duplicate("index", index_name));
        }
        let arc = self.require_table(table_name)?;
        let table = arc.read();
        let column_index = table
            .column_index(column_name)
            .ok_or_else(|| EngineError::unknown_column(table_name, column_name))?;

        let mut index = Index::new(column_name);
        index.build(table.rows(), column_index);
        drop(table);

        catalog.add_index(index_name, table_name, column_name, false);
        self.indexes.lock().insert(index_name.to_lowercase(), index);
        info!(index = index_name, table = table_name, "index created");
        Ok(())
    }

    /// Drops an index.
    ///
    /// # Errors
    ///
    /// Fails when the index does not exist.
    pub fn drop_index(&self, index_name: &str) -> Result<()> {
        let mut catalog = self.catalog.lock();
        if !catalog.index_exists(index_name) {
            return Err(EngineError::Schema(format!(
                "index '{index_name}' does not exist"
            )));
        }
        catalog.remove_index(index_name);
        self.indexes.lock().remove(&index_name.to_lowercase());
        Ok(())
    }

    /// Rebuilds a stale index against the table's current rows and
    /// returns the row ordinals holding `value`.
    ///
    /// # Errors
    ///
    /// Fails when the index or its table no longer exists.
    pub fn index_lookup(&self, index_name: &str, value: &str) -> Result<Vec<usize>> {
        let (table_name, column_name) = {
            let catalog = self.catalog.lock();
            let info = catalog.index_info(index_name).ok_or_else(|| {
                EngineError::Schema(format!("index '{index_name}' does not exist"))
            })?;
            (info.table_name.clone(), info.column_name.clone())
        };
        let arc = self.require_table(&table_name)?;
        let table = arc.read();
        let column_index = table
            .column_index(&column_name)
            .ok_or_else(|| EngineError::unknown_column(&table_name, &column_name))?;

        let mut indexes = self.indexes.lock();
        let index = indexes
            .entry(index_name.to_lowercase())
            .or_insert_with(|| Index::new(&column_name));
        index.build(table.rows(), column_index);
        Ok(index.lookup(value))
    }

    // Users and privileges

    /// Creates a user with an Argon2-hashed password.
    ///
    /// # Errors
    ///
    /// Fails on a duplicate user name or a hashing failure.
    pub fn create_user(&self, username: &str, password: &str) -> Result<()> {
        let mut users = self.users.lock();
        let Entry::Vacant(slot) = users.entry(username.to_lowercase()) else {
            return Err(EngineError::Auth(format!(
                "user '{username}' already exists"
            )));
        };
        slot.insert(User::new(username, password)?);
        info!(user = username, "user created");
        Ok(())
    }

    /// Verifies a password attempt.
    #[must_use]
    pub fn authenticate(&self, username: &str, password: &str) -> bool {
        self.users
            .lock()
            .get(&username.to_lowercase())
            .is_some_and(|user| user.authenticate(password))
    }

    /// Grants a privilege on an object to a user.
    ///
    /// # Errors
    ///
    /// Fails when the user or object is unknown.
    pub fn grant_privilege(
        &self,
        username: &str,
        object_name: &str,
        privilege: Privilege,
        with_grant_option: bool,
    ) -> Result<()> {
        if !self.users.lock().contains_key(&username.to_lowercase()) {
            return Err(EngineError::Auth(format!("user '{username}' does not exist")));
        }
        let mut catalog = self.catalog.lock();
        if !catalog.table_exists(object_name) && !catalog.view_exists(object_name) {
            return Err(EngineError::unknown_table(object_name));
        }
        catalog.add_privilege(username, object_name, privilege.as_str(), with_grant_option);
        info!(user = username, object = object_name, privilege = %privilege, "privilege granted");
        Ok(())
    }

    /// Revokes a privilege.
    pub fn revoke_privilege(&self, username: &str, object_name: &str, privilege: Privilege) {
        self.catalog
            .lock()
            .remove_privilege(username, object_name, privilege.as_str());
    }

    /// Whether a user holds a privilege (directly or via ALL).
    #[must_use]
    pub fn check_privilege(&self, username: &str, object_name: &str, privilege: Privilege) -> bool {
        self.catalog
            .lock()
            .check_privilege(username, object_name, privilege.as_str())
    }

    // Transactions

    /// Creates an inactive transaction bound to this database; call
    /// [`Transaction::begin`] to activate it.
    #[must_use]
    pub fn transaction(&self) -> Transaction<'_> {
        Transaction::new(self)
    }

    // Persistence

    /// Saves every table to `<name>.tbl` files under the directory.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors.
    pub fn save_to(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        let arcs: Vec<Arc<RwLock<Table>>> = self.tables.read().values().cloned().collect();
        for arc in arcs {
            let table = arc.read();
            storage::save_table(&table, dir)?;
        }
        info!(dir = %dir.display(), "database saved");
        Ok(())
    }

    /// Loads every `.tbl` file under the directory into new tables.
    ///
    /// Rows are reinstated verbatim, bypassing constraint checks, since
    /// they were valid when saved.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors, malformed files, or name collisions.
    pub fn load_from(&self, dir: &Path) -> Result<()> {
        for loaded in storage::load_dir(dir)? {
            self.create_table(&loaded.name, loaded.columns, Vec::new())?;
            if let Some(arc) = self.table_arc(&loaded.name) {
                arc.write().set_rows(loaded.rows);
            }
        }
        info!(dir = %dir.display(), "database loaded");
        Ok(())
    }
}

/// Finds the ordinals of child rows whose FK values match any doomed
/// parent row on the referenced columns.
fn referencing_rows(
    child: &Table,
    constraint: &Constraint,
    referenced_columns: &[String],
    doomed: &[Vec<String>],
    target_columns: &[String],
) -> Result<Vec<usize>> {
    let mut fk_indices = Vec::with_capacity(constraint.columns.len());
    for column in &constraint.columns {
        let idx = child
            .column_index(column)
            .ok_or_else(|| EngineError::unknown_column(child.name(), column))?;
        fk_indices.push(idx);
    }
    let mut referenced_indices = Vec::with_capacity(referenced_columns.len());
    for column in referenced_columns {
        let idx = target_columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
            .ok_or_else(|| EngineError::Schema(format!("unknown referenced column '{column}'")))?;
        referenced_indices.push(idx);
    }

    let mut matches = Vec::new();
    for (ordinal, row) in child.rows().iter().enumerate() {
        let hit = doomed.iter().any(|parent| {
            fk_indices
                .iter()
                .zip(&referenced_indices)
                .all(|(&fi, &ri)| {
                    // NULL FK values reference nothing.
                    row.get(fi)
                        .is_some_and(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
                        && row.get(fi) == parent.get(ri)
                })
        });
        if hit {
            matches.push(ordinal);
        }
    }
    Ok(matches)
}
