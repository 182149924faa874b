//! # opal-engine
//!
//! An in-memory relational engine with a SQL-like surface.
//!
//! The crate provides:
//! - A predicate language (tokenizer, recursive-descent parser, and an
//!   evaluatable expression tree) for WHERE-like clauses
//! - Tables with constraints (PRIMARY KEY, UNIQUE, NOT NULL, CHECK,
//!   FOREIGN KEY), joins, and set operations
//! - Transactions with snapshot-based rollback and strict two-phase
//!   locking, backed by a lock manager with deadlock detection
//!
//! ## Example
//!
//! ```rust
//! use opal_engine::{Column, Database, DataType};
//!
//! let db = Database::new();
//! db.create_table(
//!     "users",
//!     vec![
//!         Column::new("id", DataType::Integer).not_null(),
//!         Column::new("name", DataType::Varchar),
//!     ],
//!     vec![],
//! )
//! .unwrap();
//! db.insert("users", vec![vec!["1".into(), "ann".into()]]).unwrap();
//!
//! let result = db
//!     .select("users", &["name".into()], "id = 1", &[], &[], "")
//!     .unwrap();
//! assert_eq!(result.rows, vec![vec!["ann".to_string()]]);
//! ```

pub mod aggregate;
pub mod auth;
pub mod catalog;
pub mod database;
pub mod error;
pub mod fk;
pub mod index;
pub mod lock;
pub mod predicate;
pub mod schema;
pub mod storage;
pub mod table;
pub mod transaction;

pub use auth::{Privilege, User};
pub use catalog::Catalog;
pub use database::Database;
pub use error::{EngineError, Result};
pub use fk::ForeignKeyRegistry;
pub use lock::{LockManager, LockMode, LockRequest, ResourceKind};
pub use predicate::{parse_predicate, Expr, ParseError};
pub use schema::{Column, Constraint, ConstraintKind, DataType};
pub use table::{JoinType, RowSet, SortKey, Table};
pub use transaction::{IsolationLevel, Transaction};
