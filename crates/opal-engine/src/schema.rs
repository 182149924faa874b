//! Column, type, and constraint definitions.

use std::fmt;

/// Declared column type.
///
/// The closed set mirrors the accepted DDL spellings; user-defined
/// composite types carry their catalog name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// INT
    Integer,
    /// VARCHAR
    Varchar,
    /// TEXT
    Text,
    /// FLOAT
    Float,
    /// BOOLEAN
    Boolean,
    /// A user-defined composite type, by name.
    UserDefined(String),
}

impl DataType {
    /// Parses a type name case-insensitively.
    ///
    /// Unknown names are treated as user-defined type references; callers
    /// that require a built-in type check the catalog for the name first.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.to_uppercase().as_str() {
            "INT" | "INTEGER" => Self::Integer,
            "VARCHAR" => Self::Varchar,
            "TEXT" => Self::Text,
            "FLOAT" => Self::Float,
            "BOOLEAN" => Self::Boolean,
            _ => Self::UserDefined(name.to_string()),
        }
    }

    /// Returns the DDL spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Integer => "INT",
            Self::Varchar => "VARCHAR",
            Self::Text => "TEXT",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::UserDefined(name) => name,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A column definition: case-preserving name, declared type, NOT NULL flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name (matched case-insensitively, stored case-preserving).
    pub name: String,
    /// Declared type tag.
    pub data_type: DataType,
    /// Whether the column rejects NULL (empty) values.
    pub not_null: bool,
}

impl Column {
    /// Creates a nullable column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            not_null: false,
        }
    }

    /// Marks the column NOT NULL.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }
}

/// Constraint kind with kind-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstraintKind {
    /// UNIQUE + NOT NULL over the covered columns.
    PrimaryKey,
    /// No other row may match on all covered columns.
    Unique,
    /// Covered columns must be non-empty and not "null".
    NotNull,
    /// A predicate that must evaluate truthy for every row.
    Check {
        /// The predicate string, parsed lazily at validation time.
        expression: String,
    },
    /// Covered columns must reference existing rows in another table.
    ForeignKey {
        /// Referenced table name.
        referenced_table: String,
        /// Referenced column list, positionally paired with the covered
        /// columns.
        referenced_columns: Vec<String>,
        /// Delete referencing rows when the referenced row is deleted.
        cascade_delete: bool,
        /// Rewrite referencing values when the referenced key changes.
        cascade_update: bool,
    },
}

impl ConstraintKind {
    /// Returns the DDL keyword for the kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PrimaryKey => "PRIMARY KEY",
            Self::Unique => "UNIQUE",
            Self::NotNull => "NOT NULL",
            Self::Check { .. } => "CHECK",
            Self::ForeignKey { .. } => "FOREIGN KEY",
        }
    }
}

/// A named table constraint covering a list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Constraint {
    /// User-visible name, unique within its table.
    pub name: String,
    /// Covered column names.
    pub columns: Vec<String>,
    /// Kind and kind-specific attributes.
    pub kind: ConstraintKind,
}

impl Constraint {
    /// Creates a PRIMARY KEY constraint.
    #[must_use]
    pub fn primary_key(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            kind: ConstraintKind::PrimaryKey,
        }
    }

    /// Creates a UNIQUE constraint.
    #[must_use]
    pub fn unique(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            kind: ConstraintKind::Unique,
        }
    }

    /// Creates a NOT NULL constraint.
    #[must_use]
    pub fn not_null(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            kind: ConstraintKind::NotNull,
        }
    }

    /// Creates a CHECK constraint with a lazily parsed predicate.
    #[must_use]
    pub fn check(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kind: ConstraintKind::Check {
                expression: expression.into(),
            },
        }
    }

    /// Creates a FOREIGN KEY constraint without cascade behavior.
    #[must_use]
    pub fn foreign_key(
        name: impl Into<String>,
        columns: Vec<String>,
        referenced_table: impl Into<String>,
        referenced_columns: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            columns,
            kind: ConstraintKind::ForeignKey {
                referenced_table: referenced_table.into(),
                referenced_columns,
                cascade_delete: false,
                cascade_update: false,
            },
        }
    }

    /// Enables ON DELETE CASCADE on a foreign key.
    #[must_use]
    pub fn with_cascade_delete(mut self) -> Self {
        if let ConstraintKind::ForeignKey { cascade_delete, .. } = &mut self.kind {
            *cascade_delete = true;
        }
        self
    }

    /// Enables ON UPDATE CASCADE on a foreign key.
    #[must_use]
    pub fn with_cascade_update(mut self) -> Self {
        if let ConstraintKind::ForeignKey { cascade_update, .. } = &mut self.kind {
            *cascade_update = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_parse_case_insensitive() {
        assert_eq!(DataType::parse("int"), DataType::Integer);
        assert_eq!(DataType::parse("Varchar"), DataType::Varchar);
        assert_eq!(DataType::parse("BOOLEAN"), DataType::Boolean);
        assert_eq!(
            DataType::parse("address_t"),
            DataType::UserDefined("address_t".to_string())
        );
    }

    #[test]
    fn test_column_builder() {
        let col = Column::new("id", DataType::Integer).not_null();
        assert_eq!(col.name, "id");
        assert!(col.not_null);
    }

    #[test]
    fn test_cascade_flags_only_apply_to_foreign_keys() {
        let fk = Constraint::foreign_key("fk_c_p", vec!["pid".into()], "p", vec!["id".into()])
            .with_cascade_delete();
        assert!(matches!(
            fk.kind,
            ConstraintKind::ForeignKey { cascade_delete: true, cascade_update: false, .. }
        ));

        let unique = Constraint::unique("u_x", vec!["x".into()]).with_cascade_delete();
        assert_eq!(unique.kind, ConstraintKind::Unique);
    }
}
