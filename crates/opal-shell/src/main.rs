//! opal interactive shell
//!
//! Reads commands from stdin, dispatches them to the engine, and prints
//! per-operation result messages. `EXIT` terminates the loop.

mod statement;

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use opal_engine::{Database, Privilege, RowSet, SortKey, Transaction};
use statement::{JoinSpec, Statement};

/// In-memory SQL shell.
#[derive(Parser)]
#[command(name = "opal")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to load tables from on startup and save to on exit.
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

/// Nested view definitions are re-executed up to this depth.
const MAX_VIEW_DEPTH: usize = 8;

/// One interactive session: a database reference plus the current
/// transaction, if any.
struct Session<'db> {
    db: &'db Database,
    txn: Option<Transaction<'db>>,
}

impl<'db> Session<'db> {
    fn new(db: &'db Database) -> Self {
        Self { db, txn: None }
    }

    fn active_txn(&mut self) -> Option<&mut Transaction<'db>> {
        self.txn.as_mut().filter(|t| t.is_active())
    }

    fn execute(&mut self, stmt: Statement) -> Result<String> {
        match stmt {
            Statement::CreateTable {
                name,
                columns,
                constraints,
            } => {
                match self.active_txn() {
                    Some(txn) => txn.create_table(&name, columns, constraints)?,
                    None => self.db.create_table(&name, columns, constraints)?,
                }
                Ok(format!("Table '{name}' created."))
            }
            Statement::DropTable { name } => {
                match self.active_txn() {
                    Some(txn) => txn.drop_table(&name)?,
                    None => self.db.drop_table(&name)?,
                }
                Ok(format!("Table '{name}' dropped."))
            }
            Statement::AlterAddColumn { table, column } => {
                self.db.alter_table_add_column(&table, column)?;
                Ok(format!("Table '{table}' altered."))
            }
            Statement::AlterDropColumn { table, column } => {
                self.db.alter_table_drop_column(&table, &column)?;
                Ok(format!("Table '{table}' altered."))
            }
            Statement::AlterRenameColumn { table, old, new } => {
                self.db.alter_table_rename_column(&table, &old, &new)?;
                Ok(format!("Table '{table}' altered."))
            }
            Statement::Insert { table, rows } => {
                let inserted = match self.active_txn() {
                    Some(txn) => txn.insert(&table, rows)?,
                    None => self.db.insert(&table, rows)?,
                };
                Ok(format!("{inserted} row(s) inserted."))
            }
            Statement::Select {
                table,
                join,
                columns,
                condition,
                group_by,
                having,
                order_by,
            } => {
                let result = self.run_select(
                    &table, join.as_ref(), &columns, &condition, &group_by, &having, &order_by, 0,
                )?;
                Ok(render(&result))
            }
            Statement::Update {
                table,
                assignments,
                condition,
            } => {
                let updated = match self.active_txn() {
                    Some(txn) => txn.update(&table, &assignments, &condition)?,
                    None => self.db.update(&table, &assignments, &condition)?,
                };
                Ok(format!("{updated} row(s) updated."))
            }
            Statement::Delete { table, condition } => {
                let deleted = match self.active_txn() {
                    Some(txn) => txn.delete(&table, &condition)?,
                    None => self.db.delete(&table, &condition)?,
                };
                Ok(format!("{deleted} row(s) deleted."))
            }
            Statement::Truncate { table } => {
                self.db.truncate_table(&table)?;
                Ok(format!("Table '{table}' truncated."))
            }
            Statement::RenameTable { old, new } => {
                self.db.rename_table(&old, &new)?;
                Ok(format!("Table '{old}' renamed to '{new}'."))
            }
            Statement::Begin => {
                if self.active_txn().is_some() {
                    bail!("a transaction is already active");
                }
                let mut txn = self.db.transaction();
                txn.begin()?;
                let id = txn.id();
                self.txn = Some(txn);
                Ok(format!("Transaction {id} started."))
            }
            Statement::Commit => {
                let Some(mut txn) = self.txn.take() else {
                    bail!("no active transaction to commit");
                };
                let id = txn.id();
                txn.commit()?;
                Ok(format!("Transaction {id} committed."))
            }
            Statement::Rollback => {
                let Some(mut txn) = self.txn.take() else {
                    bail!("no active transaction to rollback");
                };
                let id = txn.id();
                txn.rollback()?;
                Ok(format!("Transaction {id} rolled back."))
            }
            Statement::Savepoint { name } => {
                if self.active_txn().is_none() {
                    bail!("SAVEPOINT requires an active transaction");
                }
                Ok(format!(
                    "Savepoint '{name}' noted; rollback is transaction-scoped."
                ))
            }
            Statement::CreateIndex {
                name,
                table,
                column,
            } => {
                self.db.create_index(&name, &table, &column)?;
                Ok(format!("Index '{name}' created."))
            }
            Statement::DropIndex { name } => {
                self.db.drop_index(&name)?;
                Ok(format!("Index '{name}' dropped."))
            }
            Statement::CreateView { name, definition } => {
                self.db.create_view(&name, &definition)?;
                Ok(format!("View '{name}' created."))
            }
            Statement::DropView { name } => {
                self.db.drop_view(&name)?;
                Ok(format!("View '{name}' dropped."))
            }
            Statement::CreateType { name, attributes } => {
                self.db.create_type(&name, attributes)?;
                Ok(format!("Type '{name}' created."))
            }
            Statement::DropType { name } => {
                self.db.drop_type(&name)?;
                Ok(format!("Type '{name}' dropped."))
            }
            Statement::CreateAssertion { name, condition } => {
                self.db.create_assertion(&name, &condition)?;
                Ok(format!("Assertion '{name}' created."))
            }
            Statement::DropAssertion { name } => {
                self.db.drop_assertion(&name)?;
                Ok(format!("Assertion '{name}' dropped."))
            }
            Statement::CreateUser { name, password } => {
                self.db.create_user(&name, &password)?;
                Ok(format!("User '{name}' created."))
            }
            Statement::Grant {
                privilege,
                object,
                user,
                with_grant_option,
            } => {
                let privilege = Privilege::from_str(&privilege)?;
                self.db
                    .grant_privilege(&user, &object, privilege, with_grant_option)?;
                Ok(format!("Granted {privilege} on '{object}' to '{user}'."))
            }
            Statement::Revoke {
                privilege,
                object,
                user,
            } => {
                let privilege = Privilege::from_str(&privilege)?;
                self.db.revoke_privilege(&user, &object, privilege);
                Ok(format!("Revoked {privilege} on '{object}' from '{user}'."))
            }
            Statement::ShowTables => {
                let names = self.db.table_names();
                if names.is_empty() {
                    Ok("No tables.".to_string())
                } else {
                    Ok(names.join("\n"))
                }
            }
            Statement::ShowViews => {
                let names = self.db.view_names();
                if names.is_empty() {
                    Ok("No views.".to_string())
                } else {
                    Ok(names.join("\n"))
                }
            }
            Statement::Describe { name } => {
                let info = self.db.describe_table(&name)?;
                let mut out = String::new();
                for column in &info.columns {
                    out.push_str(&format!(
                        "{}\t{}{}\n",
                        column.name,
                        column.data_type,
                        if column.not_null { "\tNOT NULL" } else { "" }
                    ));
                }
                for constraint in &info.constraints {
                    out.push_str(&format!(
                        "{}\t{}\t({})\n",
                        constraint.name,
                        constraint.kind.as_str(),
                        constraint.columns.join(", ")
                    ));
                }
                Ok(out.trim_end().to_string())
            }
            Statement::Upsert { table, rows } => {
                let (inserted, updated) = self.db.upsert(&table, rows)?;
                Ok(format!("{inserted} row(s) inserted, {updated} row(s) updated."))
            }
            Statement::Save { dir } => {
                self.db.save_to(Path::new(&dir))?;
                Ok(format!("Database saved to '{dir}'."))
            }
            Statement::Load { dir } => {
                self.db.load_from(Path::new(&dir))?;
                Ok(format!("Database loaded from '{dir}'."))
            }
            Statement::Exit => Ok(String::new()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn run_select(
        &mut self,
        table: &str,
        join: Option<&JoinSpec>,
        columns: &[String],
        condition: &str,
        group_by: &[String],
        having: &str,
        order_by: &[SortKey],
        depth: usize,
    ) -> Result<RowSet> {
        // A view name in FROM re-executes the view's defining query.
        if join.is_none() && !self.db.table_exists(table) {
            if let Ok(definition) = self.db.view_definition(table) {
                if depth >= MAX_VIEW_DEPTH {
                    bail!("view nesting too deep at '{table}'");
                }
                let Statement::Select {
                    table: inner_table,
                    join: inner_join,
                    columns: inner_columns,
                    condition: inner_condition,
                    group_by: inner_group_by,
                    having: inner_having,
                    order_by: inner_order_by,
                } = statement::parse(&definition)?
                else {
                    bail!("view '{table}' does not define a SELECT");
                };
                return self.run_select(
                    &inner_table,
                    inner_join.as_ref(),
                    &inner_columns,
                    &inner_condition,
                    &inner_group_by,
                    &inner_having,
                    &inner_order_by,
                    depth + 1,
                );
            }
        }

        if let Some(join) = join {
            if let Some(txn) = self.active_txn() {
                txn.lock_table_shared(table)?;
                txn.lock_table_shared(&join.right)?;
            }
            return Ok(self.db.join_tables(
                table,
                &join.right,
                join.join_type,
                &join.condition,
                columns,
            )?);
        }

        match self.active_txn() {
            Some(txn) => {
                Ok(txn.select(table, columns, condition, order_by, group_by, having)?)
            }
            None => Ok(self
                .db
                .select(table, columns, condition, order_by, group_by, having)?),
        }
    }
}

/// Formats a result as an aligned text table.
fn render(result: &RowSet) -> String {
    if result.rows.is_empty() {
        return "0 row(s).".to_string();
    }

    let mut widths: Vec<usize> = result.columns.iter().map(String::len).collect();
    for row in &result.rows {
        for (i, value) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(value.len());
            }
        }
    }

    let mut out = String::new();
    let fmt_line = |cells: &[String], widths: &[usize]| -> String {
        cells
            .iter()
            .enumerate()
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths.get(i).copied().unwrap_or(0)))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    out.push_str(&fmt_line(&result.columns, &widths));
    out.push('\n');
    for row in &result.rows {
        out.push_str(&fmt_line(row, &widths));
        out.push('\n');
    }
    out.push_str(&format!("{} row(s).", result.rows.len()));
    out
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let db = Database::new();
    if let Some(dir) = &cli.data_dir {
        if dir.exists() {
            db.load_from(dir)?;
            info!(dir = %dir.display(), "tables loaded");
        }
    }

    println!("opal interactive shell (type EXIT to quit)");

    let stdin = io::stdin();
    let mut session = Session::new(&db);
    let mut line = String::new();
    loop {
        print!("> ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        match statement::parse(command) {
            Ok(Statement::Exit) => break,
            Ok(stmt) => match session.execute(stmt) {
                Ok(message) => println!("{message}"),
                Err(error) => println!("Error: {error}"),
            },
            Err(error) => println!("Error: {error}"),
        }
    }

    // An open transaction rolls back when the session drops.
    drop(session);
    if let Some(dir) = &cli.data_dir {
        db.save_to(dir)?;
        info!(dir = %dir.display(), "tables saved");
    }
    Ok(())
}
