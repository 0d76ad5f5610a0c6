//! SQL to Elasticsearch Query DSL translation
//!
//! This crate compiles a restricted MySQL-flavoured SELECT into an
//! Elasticsearch search request body, using sqlparser-rs (generic dialect)
//! for parsing.
//!
//! # Features
//!
//! - WHERE: comparisons, IN, LIKE, REGEXP, IS NULL, BETWEEN, AND/OR/NOT
//! - GROUP BY columns as a `composite` aggregation
//! - COUNT, COUNT(DISTINCT), SUM, AVG, MIN, MAX metrics
//! - HISTOGRAM, DATE_HISTOGRAM, RANGE, DATE_RANGE and GROUP_CONCAT
//! - ORDER BY aggregates (`bucket_sort`), HAVING (`bucket_selector`)
//! - Computed aggregate columns (`bucket_script`)
//! - LIMIT/OFFSET paging and `search_after` continuation
//!
//! # Example
//!
//! ```ignore
//! use esql_dsl::Esql;
//!
//! let esql = Esql::new();
//! let conversion = esql.convert(
//!     "SELECT colA, AVG(colB) FROM t GROUP BY colA ORDER BY AVG(colB) DESC",
//!     &[],
//! )?;
//! println!("{}", conversion.dsl);
//! ```

pub mod aggregation;
pub mod ast;
mod config;
mod error;
mod esql;
pub mod expression;
mod functions;
mod lower;
mod parser;
pub mod predicate;
pub mod script;
mod tags;
mod translator;

pub use config::{
    ColumnFilter, ColumnRewrite, QueryConfig, QuerySettings, ValueRewrite, DEFAULT_BUCKET_COUNT,
    DEFAULT_PAGE_SIZE,
};
pub use error::{Result, SqlError};
pub use esql::{Conversion, Esql};
pub use functions::{AggregateKind, FunctionRegistry};
pub use lower::Lowering;
pub use parser::SqlParser;
pub use tags::{AggAllocation, AggTagMap, COUNT_TAG};
pub use translator::{SqlTranslator, Translation};
