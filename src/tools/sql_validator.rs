//! Read-only statement validation for the `read_query` tool.
//!
//! Statements are parsed with [sqlparser](https://docs.rs/sqlparser/) in the
//! connected dialect's grammar and classified by AST node, so formatting
//! tricks cannot smuggle a write through. Vendor syntax the grammar does not
//! cover (Oracle hints, T-SQL table hints) falls back to a keyword check: the
//! text must be a single statement beginning with `SELECT` or `WITH`.

use crate::error::{DbError, DbResult};
use crate::models::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{
    Dialect, GenericDialect, MsSqlDialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect,
};
use sqlparser::parser::Parser;
use tracing::debug;

/// Type of SQL statement detected by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlStatementType {
    /// SELECT and other read-only queries (SELECT, SHOW, EXPLAIN, VALUES)
    Read,
    /// INSERT, UPDATE, DELETE, MERGE
    DmlWrite,
    /// CREATE, DROP, ALTER, TRUNCATE
    Ddl,
    /// BEGIN, COMMIT, ROLLBACK, SAVEPOINT
    Transaction,
    /// CALL, EXECUTE (stored procedures)
    ProcedureCall,
    /// GRANT, REVOKE, SET, LOCK, VACUUM
    Administrative,
    Unknown,
}

mod error_messages {
    pub const DML_WRITE: &str =
        "Write operations not allowed in read_query. Use write_query for INSERT/UPDATE/DELETE.";
    pub const DDL: &str =
        "DDL operations not allowed in read_query. Use write_query for schema modifications.";
    pub const TRANSACTION: &str = "Transaction control not allowed in read_query.";
    pub const PROCEDURE: &str =
        "Procedure calls not allowed in read_query. Use write_query for stored procedures.";
    pub const ADMINISTRATIVE: &str = "Administrative operations not allowed in read_query.";
    pub const UNKNOWN: &str =
        "Unrecognized SQL statement. Only SELECT queries are allowed in read_query.";
    pub const NOT_SELECT: &str = "Only SELECT or WITH queries are allowed in read_query.";
    pub const MULTIPLE: &str =
        "Multiple statements are not allowed in read_query unless every one can be parsed.";
}

/// Get the sqlparser grammar for the given database type.
fn get_dialect(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::PostgreSQL => Box::new(PostgreSqlDialect {}),
        DatabaseType::MySQL => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
        DatabaseType::SqlServer => Box::new(MsSqlDialect {}),
        DatabaseType::Oracle => Box::new(GenericDialect {}),
    }
}

/// Validate SQL for the read-only `read_query` tool.
///
/// Returns `Err(DbError::Permission)` for anything that is not a read, and
/// `Err(DbError::InvalidInput)` for empty input.
///
/// ```
/// use multi_db_mcp::tools::sql_validator::validate_readonly;
/// use multi_db_mcp::models::DatabaseType;
///
/// assert!(validate_readonly("SELECT * FROM users", DatabaseType::Oracle).is_ok());
/// assert!(validate_readonly("DELETE FROM users", DatabaseType::MySQL).is_err());
/// ```
pub fn validate_readonly(sql: &str, db_type: DatabaseType) -> DbResult<()> {
    if sql.trim().is_empty() {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }

    let dialect = get_dialect(db_type);
    let statements = match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) => statements,
        Err(e) => {
            debug!(dialect = %db_type, error = %e, "Falling back to keyword check");
            return validate_leading_keyword(sql);
        }
    };

    if statements.is_empty() {
        return Err(DbError::invalid_input("Empty SQL statement"));
    }

    for stmt in statements {
        validate_statement(&stmt)?;
    }

    Ok(())
}

/// Keyword check for text the grammar could not parse.
///
/// Drivers run every statement of an unparameterized string, so a `;`
/// anywhere but the end is refused, even inside a literal.
fn validate_leading_keyword(sql: &str) -> DbResult<()> {
    if sql.trim_end().trim_end_matches(';').contains(';') {
        return Err(DbError::permission("Multiple", error_messages::MULTIPLE));
    }

    let keyword = leading_keyword(sql);
    if keyword == "SELECT" || keyword == "WITH" {
        Ok(())
    } else {
        let operation = if keyword.is_empty() {
            "Unknown".to_string()
        } else {
            keyword
        };
        Err(DbError::permission(operation, error_messages::NOT_SELECT))
    }
}

/// First word of the statement, upper-cased, skipping comments and parentheses.
fn leading_keyword(sql: &str) -> String {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail).trim_start();
        } else if let Some(after) = rest.strip_prefix('(') {
            rest = after.trim_start();
        } else {
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

fn validate_statement(stmt: &Statement) -> DbResult<()> {
    let (stmt_type, operation_name) = classify_statement(stmt);

    let reason = match stmt_type {
        SqlStatementType::Read => return Ok(()),
        SqlStatementType::DmlWrite => error_messages::DML_WRITE,
        SqlStatementType::Ddl => error_messages::DDL,
        SqlStatementType::Transaction => error_messages::TRANSACTION,
        SqlStatementType::ProcedureCall => error_messages::PROCEDURE,
        SqlStatementType::Administrative => error_messages::ADMINISTRATIVE,
        SqlStatementType::Unknown => error_messages::UNKNOWN,
    };
    Err(DbError::permission(operation_name, reason))
}

/// Classify a parsed statement into a statement type.
fn classify_statement(stmt: &Statement) -> (SqlStatementType, &'static str) {
    match stmt {
        Statement::Query(_) => (SqlStatementType::Read, "SELECT"),
        Statement::ShowTables { .. } => (SqlStatementType::Read, "SHOW TABLES"),
        Statement::ShowColumns { .. } => (SqlStatementType::Read, "SHOW COLUMNS"),
        Statement::ShowDatabases { .. } => (SqlStatementType::Read, "SHOW DATABASES"),
        Statement::ShowSchemas { .. } => (SqlStatementType::Read, "SHOW SCHEMAS"),
        Statement::ShowCreate { .. } => (SqlStatementType::Read, "SHOW CREATE"),
        Statement::ShowVariable { .. } => (SqlStatementType::Read, "SHOW VARIABLE"),
        Statement::ShowVariables { .. } => (SqlStatementType::Read, "SHOW VARIABLES"),
        Statement::ShowStatus { .. } => (SqlStatementType::Read, "SHOW STATUS"),
        Statement::ExplainTable { .. } => (SqlStatementType::Read, "EXPLAIN TABLE"),

        // EXPLAIN ANALYZE runs its statement, so the inner statement decides
        Statement::Explain { statement, .. } => match classify_statement(statement) {
            (SqlStatementType::Read, _) => (SqlStatementType::Read, "EXPLAIN"),
            other => other,
        },

        Statement::Insert(_) => (SqlStatementType::DmlWrite, "INSERT"),
        Statement::Update { .. } => (SqlStatementType::DmlWrite, "UPDATE"),
        Statement::Delete(_) => (SqlStatementType::DmlWrite, "DELETE"),
        Statement::Merge { .. } => (SqlStatementType::DmlWrite, "MERGE"),
        Statement::Copy { .. } => (SqlStatementType::DmlWrite, "COPY"),

        Statement::CreateTable { .. } => (SqlStatementType::Ddl, "CREATE TABLE"),
        Statement::CreateView { .. } => (SqlStatementType::Ddl, "CREATE VIEW"),
        Statement::CreateIndex(_) => (SqlStatementType::Ddl, "CREATE INDEX"),
        Statement::CreateSchema { .. } => (SqlStatementType::Ddl, "CREATE SCHEMA"),
        Statement::CreateDatabase { .. } => (SqlStatementType::Ddl, "CREATE DATABASE"),
        Statement::CreateSequence { .. } => (SqlStatementType::Ddl, "CREATE SEQUENCE"),
        Statement::CreateFunction { .. } => (SqlStatementType::Ddl, "CREATE FUNCTION"),
        Statement::CreateProcedure { .. } => (SqlStatementType::Ddl, "CREATE PROCEDURE"),
        Statement::CreateTrigger { .. } => (SqlStatementType::Ddl, "CREATE TRIGGER"),
        Statement::AlterTable { .. } => (SqlStatementType::Ddl, "ALTER TABLE"),
        Statement::AlterView { .. } => (SqlStatementType::Ddl, "ALTER VIEW"),
        Statement::AlterIndex { .. } => (SqlStatementType::Ddl, "ALTER INDEX"),
        Statement::Drop { .. } => (SqlStatementType::Ddl, "DROP"),
        Statement::DropFunction { .. } => (SqlStatementType::Ddl, "DROP FUNCTION"),
        Statement::DropProcedure { .. } => (SqlStatementType::Ddl, "DROP PROCEDURE"),
        Statement::DropTrigger { .. } => (SqlStatementType::Ddl, "DROP TRIGGER"),
        Statement::Truncate { .. } => (SqlStatementType::Ddl, "TRUNCATE"),
        Statement::Comment { .. } => (SqlStatementType::Ddl, "COMMENT"),

        Statement::StartTransaction { .. } => (SqlStatementType::Transaction, "BEGIN"),
        Statement::Commit { .. } => (SqlStatementType::Transaction, "COMMIT"),
        Statement::Rollback { .. } => (SqlStatementType::Transaction, "ROLLBACK"),
        Statement::Savepoint { .. } => (SqlStatementType::Transaction, "SAVEPOINT"),
        Statement::ReleaseSavepoint { .. } => (SqlStatementType::Transaction, "RELEASE SAVEPOINT"),

        Statement::Call { .. } => (SqlStatementType::ProcedureCall, "CALL"),
        Statement::Execute { .. } => (SqlStatementType::ProcedureCall, "EXECUTE"),
        Statement::Prepare { .. } => (SqlStatementType::ProcedureCall, "PREPARE"),

        Statement::Grant { .. } => (SqlStatementType::Administrative, "GRANT"),
        Statement::Revoke { .. } => (SqlStatementType::Administrative, "REVOKE"),
        Statement::Set(_) => (SqlStatementType::Administrative, "SET"),
        Statement::Use(_) => (SqlStatementType::Administrative, "USE"),
        Statement::Kill { .. } => (SqlStatementType::Administrative, "KILL"),
        Statement::Vacuum { .. } => (SqlStatementType::Administrative, "VACUUM"),
        Statement::Analyze { .. } => (SqlStatementType::Administrative, "ANALYZE"),
        Statement::LockTables { .. } => (SqlStatementType::Administrative, "LOCK"),
        Statement::UnlockTables => (SqlStatementType::Administrative, "UNLOCK"),
        Statement::Pragma { .. } => (SqlStatementType::Administrative, "PRAGMA"),
        Statement::AttachDatabase { .. } => (SqlStatementType::Administrative, "ATTACH"),

        _ => (SqlStatementType::Unknown, "Unknown"),
    }
}
