//! Metadata catalog.
//!
//! In-memory registry of tables, views, indexes, user-defined types,
//! assertions, and privileges. Lookups are case-insensitive; display names
//! preserve their original case. Renaming a table rewrites every dependent
//! index and privilege reference; drops cascade the same way.

use std::collections::HashMap;

use crate::schema::{Column, Constraint};

/// Table metadata.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Case-preserving table name.
    pub name: String,
    /// Column definitions.
    pub columns: Vec<Column>,
    /// Table constraints.
    pub constraints: Vec<Constraint>,
}

/// View metadata.
#[derive(Debug, Clone)]
pub struct ViewInfo {
    /// Case-preserving view name.
    pub name: String,
    /// The defining query text.
    pub definition: String,
    /// Whether DML through the view is allowed.
    pub updatable: bool,
}

/// Index metadata.
#[derive(Debug, Clone)]
pub struct IndexInfo {
    /// Case-preserving index name.
    pub name: String,
    /// Indexed table.
    pub table_name: String,
    /// Indexed column.
    pub column_name: String,
    /// Whether the index enforces uniqueness.
    pub unique: bool,
}

/// User-defined type metadata.
#[derive(Debug, Clone)]
pub struct TypeInfo {
    /// Case-preserving type name.
    pub name: String,
    /// Attribute name/type pairs.
    pub attributes: Vec<(String, String)>,
}

/// Assertion metadata.
#[derive(Debug, Clone)]
pub struct AssertionInfo {
    /// Case-preserving assertion name.
    pub name: String,
    /// The asserted condition text.
    pub condition: String,
}

/// Privilege metadata.
#[derive(Debug, Clone)]
pub struct PrivilegeInfo {
    /// Grantee user name.
    pub username: String,
    /// Object the privilege covers.
    pub object_name: String,
    /// SELECT, INSERT, UPDATE, DELETE, or ALL.
    pub privilege: String,
    /// Whether the grantee may grant onward.
    pub with_grant_option: bool,
}

/// The metadata registry, keyed by lowercased name per object kind.
#[derive(Debug, Default)]
pub struct Catalog {
    tables: HashMap<String, TableInfo>,
    views: HashMap<String, ViewInfo>,
    indexes: HashMap<String, IndexInfo>,
    types: HashMap<String, TypeInfo>,
    assertions: HashMap<String, AssertionInfo>,
    privileges: Vec<PrivilegeInfo>,
}

impl Catalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Tables

    /// Records a table.
    pub fn add_table(&mut self, name: &str, columns: Vec<Column>, constraints: Vec<Constraint>) {
        self.tables.insert(
            name.to_lowercase(),
            TableInfo {
                name: name.to_string(),
                columns,
                constraints,
            },
        );
    }

    /// Removes a table, cascading to its indexes and privileges.
    pub fn remove_table(&mut self, name: &str) {
        let key = name.to_lowercase();
        self.tables.remove(&key);
        self.indexes
            .retain(|_, index| !index.table_name.eq_ignore_ascii_case(name));
        self.privileges
            .retain(|p| !p.object_name.eq_ignore_ascii_case(name));
    }

    /// Renames a table, rewriting dependent index and privilege references.
    pub fn rename_table(&mut self, old_name: &str, new_name: &str) {
        let old_key = old_name.to_lowercase();
        if let Some(mut info) = self.tables.remove(&old_key) {
            info.name = new_name.to_string();
            self.tables.insert(new_name.to_lowercase(), info);

            for index in self.indexes.values_mut() {
                if index.table_name.eq_ignore_ascii_case(old_name) {
                    index.table_name = new_name.to_string();
                }
            }
            for privilege in &mut self.privileges {
                if privilege.object_name.eq_ignore_ascii_case(old_name) {
                    privilege.object_name = new_name.to_string();
                }
            }
        }
    }

    /// Replaces a table's recorded schema.
    pub fn update_table(&mut self, name: &str, columns: Vec<Column>, constraints: Vec<Constraint>) {
        if let Some(info) = self.tables.get_mut(&name.to_lowercase()) {
            info.columns = columns;
            info.constraints = constraints;
        }
    }

    /// Whether a table exists.
    #[must_use]
    pub fn table_exists(&self, name: &str) -> bool {
        self.tables.contains_key(&name.to_lowercase())
    }

    /// Table metadata, if present.
    #[must_use]
    pub fn table_info(&self, name: &str) -> Option<&TableInfo> {
        self.tables.get(&name.to_lowercase())
    }

    /// All table display names, sorted.
    #[must_use]
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }

    // Views

    /// Records a view.
    pub fn add_view(&mut self, name: &str, definition: &str, updatable: bool) {
        self.views.insert(
            name.to_lowercase(),
            ViewInfo {
                name: name.to_string(),
                definition: definition.to_string(),
                updatable,
            },
        );
    }

    /// Removes a view, cascading to its privileges.
    pub fn remove_view(&mut self, name: &str) {
        self.views.remove(&name.to_lowercase());
        self.privileges
            .retain(|p| !p.object_name.eq_ignore_ascii_case(name));
    }

    /// Whether a view exists.
    #[must_use]
    pub fn view_exists(&self, name: &str) -> bool {
        self.views.contains_key(&name.to_lowercase())
    }

    /// View metadata, if present.
    #[must_use]
    pub fn view_info(&self, name: &str) -> Option<&ViewInfo> {
        self.views.get(&name.to_lowercase())
    }

    /// All view display names, sorted.
    #[must_use]
    pub fn view_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.views.values().map(|v| v.name.clone()).collect();
        names.sort();
        names
    }

    // Indexes

    /// Records an index.
    pub fn add_index(&mut self, name: &str, table_name: &str, column_name: &str, unique: bool) {
        self.indexes.insert(
            name.to_lowercase(),
            IndexInfo {
                name: name.to_string(),
                table_name: table_name.to_string(),
                column_name: column_name.to_string(),
                unique,
            },
        );
    }

    /// Removes an index.
    pub fn remove_index(&mut self, name: &str) {
        self.indexes.remove(&name.to_lowercase());
    }

    /// Whether an index exists.
    #[must_use]
    pub fn index_exists(&self, name: &str) -> bool {
        self.indexes.contains_key(&name.to_lowercase())
    }

    /// Index metadata, if present.
    #[must_use]
    pub fn index_info(&self, name: &str) -> Option<&IndexInfo> {
        self.indexes.get(&name.to_lowercase())
    }

    // User-defined types

    /// Records a user-defined type.
    pub fn add_type(&mut self, name: &str, attributes: Vec<(String, String)>) {
        self.types.insert(
            name.to_lowercase(),
            TypeInfo {
                name: name.to_string(),
                attributes,
            },
        );
    }

    /// Removes a user-defined type.
    pub fn remove_type(&mut self, name: &str) {
        self.types.remove(&name.to_lowercase());
    }

    /// Whether a user-defined type exists.
    #[must_use]
    pub fn type_exists(&self, name: &str) -> bool {
        self.types.contains_key(&name.to_lowercase())
    }

    /// Type metadata, if present.
    #[must_use]
    pub fn type_info(&self, name: &str) -> Option<&TypeInfo> {
        self.types.get(&name.to_lowercase())
    }

    // Assertions

    /// Records an assertion.
    pub fn add_assertion(&mut self, name: &str, condition: &str) {
        self.assertions.insert(
            name.to_lowercase(),
            AssertionInfo {
                name: name.to_string(),
                condition: condition.to_string(),
            },
        );
    }

    /// Removes an assertion.
    pub fn remove_assertion(&mut self, name: &str) {
        self.assertions.remove(&name.to_lowercase());
    }

    /// Whether an assertion exists.
    #[must_use]
    pub fn assertion_exists(&self, name: &str) -> bool {
        self.assertions.contains_key(&name.to_lowercase())
    }

    /// Assertion metadata, if present.
    #[must_use]
    pub fn assertion_info(&self, name: &str) -> Option<&AssertionInfo> {
        self.assertions.get(&name.to_lowercase())
    }

    // Privileges

    /// Grants a privilege, replacing an identical earlier grant.
    pub fn add_privilege(
        &mut self,
        username: &str,
        object_name: &str,
        privilege: &str,
        with_grant_option: bool,
    ) {
        self.privileges.retain(|p| {
            !(p.username.eq_ignore_ascii_case(username)
                && p.object_name.eq_ignore_ascii_case(object_name)
                && p.privilege.eq_ignore_ascii_case(privilege))
        });
        self.privileges.push(PrivilegeInfo {
            username: username.to_string(),
            object_name: object_name.to_string(),
            privilege: privilege.to_uppercase(),
            with_grant_option,
        });
    }

    /// Revokes a privilege.
    pub fn remove_privilege(&mut self, username: &str, object_name: &str, privilege: &str) {
        self.privileges.retain(|p| {
            !(p.username.eq_ignore_ascii_case(username)
                && p.object_name.eq_ignore_ascii_case(object_name)
                && p.privilege.eq_ignore_ascii_case(privilege))
        });
    }

    /// Whether the user holds the privilege (or ALL) on the object.
    #[must_use]
    pub fn check_privilege(&self, username: &str, object_name: &str, privilege: &str) -> bool {
        self.privileges.iter().any(|p| {
            p.username.eq_ignore_ascii_case(username)
                && p.object_name.eq_ignore_ascii_case(object_name)
                && (p.privilege.eq_ignore_ascii_case(privilege) || p.privilege == "ALL")
        })
    }

    /// Every privilege held by a user.
    #[must_use]
    pub fn user_privileges(&self, username: &str) -> Vec<PrivilegeInfo> {
        self.privileges
            .iter()
            .filter(|p| p.username.eq_ignore_ascii_case(username))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::DataType;

    fn catalog_with_table(name: &str) -> Catalog {
        let mut catalog = Catalog::new();
        catalog.add_table(
            name,
            vec![Column::new("id", DataType::Integer)],
            Vec::new(),
        );
        catalog
    }

    #[test]
    fn test_case_insensitive_lookup_preserves_case() {
        let catalog = catalog_with_table("Employees");
        assert!(catalog.table_exists("EMPLOYEES"));
        assert!(catalog.table_exists("employees"));
        assert_eq!(catalog.table_info("employees").unwrap().name, "Employees");
    }

    #[test]
    fn test_drop_table_cascades_indexes_and_privileges() {
        let mut catalog = catalog_with_table("t");
        catalog.add_index("idx_t_id", "t", "id", false);
        catalog.add_privilege("alice", "t", "SELECT", false);

        catalog.remove_table("T");

        assert!(!catalog.table_exists("t"));
        assert!(!catalog.index_exists("idx_t_id"));
        assert!(!catalog.check_privilege("alice", "t", "SELECT"));
    }

    #[test]
    fn test_rename_table_rewrites_dependents() {
        let mut catalog = catalog_with_table("old");
        catalog.add_index("idx_old", "old", "id", false);
        catalog.add_privilege("bob", "old", "INSERT", false);

        catalog.rename_table("old", "new");

        assert!(!catalog.table_exists("old"));
        assert!(catalog.table_exists("new"));
        assert_eq!(catalog.index_info("idx_old").unwrap().table_name, "new");
        assert!(catalog.check_privilege("bob", "new", "INSERT"));
        assert!(!catalog.check_privilege("bob", "old", "INSERT"));
    }

    #[test]
    fn test_drop_view_cascades_privileges() {
        let mut catalog = Catalog::new();
        catalog.add_view("v", "SELECT * FROM t", false);
        catalog.add_privilege("carol", "v", "SELECT", false);

        catalog.remove_view("V");

        assert!(!catalog.view_exists("v"));
        assert!(!catalog.check_privilege("carol", "v", "SELECT"));
    }

    #[test]
    fn test_all_privilege_implies_each() {
        let mut catalog = catalog_with_table("t");
        catalog.add_privilege("dave", "t", "ALL", true);
        assert!(catalog.check_privilege("dave", "t", "SELECT"));
        assert!(catalog.check_privilege("dave", "t", "delete"));
    }

    #[test]
    fn test_regrant_replaces_existing() {
        let mut catalog = catalog_with_table("t");
        catalog.add_privilege("erin", "t", "SELECT", false);
        catalog.add_privilege("erin", "t", "select", true);
        let privileges = catalog.user_privileges("erin");
        assert_eq!(privileges.len(), 1);
        assert!(privileges[0].with_grant_option);
    }

    #[test]
    fn test_sorted_name_lists() {
        let mut catalog = Catalog::new();
        catalog.add_table("zebra", Vec::new(), Vec::new());
        catalog.add_table("apple", Vec::new(), Vec::new());
        assert_eq!(catalog.table_names(), vec!["apple", "zebra"]);
    }
}
