//! SQL parsing wrapper around sqlparser-rs

use crate::error::{Result, SqlError};
use sqlparser::ast::Statement;
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

/// SQL parser for translatable statements
///
/// Uses the generic dialect, which accepts backtick identifiers, `REGEXP`,
/// `GROUP_CONCAT(... SEPARATOR s)`, `LIMIT o, n` and the `<<`/`>>` shift
/// operators. Strings are single-quoted; `"x"` is an identifier.
pub struct SqlParser;

impl SqlParser {
    /// Parse a SQL string into exactly one statement
    pub fn parse(sql: &str) -> Result<Statement> {
        let dialect = GenericDialect {};
        let statements = Parser::parse_sql(&dialect, sql)?;

        if statements.len() > 1 {
            return Err(SqlError::UnsupportedStatement(
                "Multiple statements not supported".to_string(),
            ));
        }

        statements
            .into_iter()
            .next()
            .ok_or_else(|| SqlError::Parse("Empty SQL statement".to_string()))
    }

    /// Parse and validate that the statement is a SELECT
    pub fn parse_select(sql: &str) -> Result<Statement> {
        let stmt = Self::parse(sql)?;

        match &stmt {
            Statement::Query(_) => Ok(stmt),
            _ => Err(SqlError::UnsupportedStatement(format!(
                "Only SELECT queries are supported, got: {}",
                stmt
            ))),
        }
    }
}
