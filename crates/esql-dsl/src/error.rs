//! Translation error types

use thiserror::Error;

/// SQL to DSL translation errors
///
/// Every error is terminal for the call: no partial DSL is ever returned
/// alongside one.
#[derive(Debug, Error)]
pub enum SqlError {
    /// SQL parsing error
    #[error("SQL parse error: {0}")]
    Parse(String),

    /// Statement kind or statement-level construct that is not implemented
    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    /// Expression kind that is not implemented in its position
    #[error("Unsupported expression: {0}")]
    UnsupportedExpression(String),

    /// Unknown aggregate function name
    #[error("Unsupported aggregate function: {0}")]
    UnsupportedAggregateFunction(String),

    /// Operator that has no scripting counterpart
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),

    /// Structurally invalid statement (FROM, HAVING, ORDER BY, LIMIT rules)
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    /// Expression with an invalid shape, e.g. a comparison whose left side is not a column
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    /// SELECT references a column outside the GROUP BY key set
    #[error("Column {0} is selected but not part of GROUP BY")]
    ColumnNotInGroupBy(String),

    /// Column rejected by the configured column filter
    #[error("Column not allowed: {0}")]
    ColumnNotAllowed(String),

    /// DISTINCT used with a function that does not support it
    #[error("DISTINCT not supported with aggregate function {0}")]
    DistinctNotSupported(String),

    /// Same aggregation ordered both ascending and descending
    #[error("Conflicting ORDER BY directions for {0}")]
    OrderDirectionConflict(String),

    /// A configured column or value rewrite failed
    #[error("Rewrite of {target} failed: {reason}")]
    Rewrite { target: String, reason: String },

    /// Invalid translator configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// DSL serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for translation operations
pub type Result<T> = std::result::Result<T, SqlError>;

impl From<sqlparser::parser::ParserError> for SqlError {
    fn from(e: sqlparser::parser::ParserError) -> Self {
        SqlError::Parse(e.to_string())
    }
}
