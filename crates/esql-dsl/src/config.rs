//! Translator configuration and column policy

use crate::error::{Result, SqlError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Default `size` of plain queries without LIMIT
pub const DEFAULT_PAGE_SIZE: usize = 1000;
/// Default `size` of the composite aggregation
pub const DEFAULT_BUCKET_COUNT: usize = 1000;

/// Decides whether a column may appear in a query
pub type ColumnFilter = Arc<dyn Fn(&str) -> bool + Send + Sync>;
/// Maps a column name to the field name emitted in the DSL
pub type ColumnRewrite = Arc<dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync>;
/// Maps a `(column, value)` pair to the value emitted in the DSL
pub type ValueRewrite =
    Arc<dyn Fn(&str, &str) -> std::result::Result<String, String> + Send + Sync>;

/// Runtime configuration consulted by every translator
#[derive(Clone)]
pub struct QueryConfig {
    pub page_size: usize,
    pub bucket_count: usize,
    /// Visibility profile: default sort and RunID tie-breaker
    pub compatibility_mode: bool,
    pub column_filter: Option<ColumnFilter>,
    pub column_rewrite: Option<ColumnRewrite>,
    pub value_rewrite: Option<ValueRewrite>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bucket_count: DEFAULT_BUCKET_COUNT,
            compatibility_mode: false,
            column_filter: None,
            column_rewrite: None,
            value_rewrite: None,
        }
    }
}

impl fmt::Debug for QueryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryConfig")
            .field("page_size", &self.page_size)
            .field("bucket_count", &self.bucket_count)
            .field("compatibility_mode", &self.compatibility_mode)
            .field("column_filter", &self.column_filter.is_some())
            .field("column_rewrite", &self.column_rewrite.is_some())
            .field("value_rewrite", &self.value_rewrite.is_some())
            .finish()
    }
}

impl QueryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(SqlError::InvalidConfig(
                "page_size must be positive".to_string(),
            ));
        }
        if self.bucket_count == 0 {
            return Err(SqlError::InvalidConfig(
                "bucket_count must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the column policy: filter on the written name, then rewrite
    pub fn column(&self, name: &str) -> Result<String> {
        if let Some(filter) = &self.column_filter {
            if !filter(name) {
                return Err(SqlError::ColumnNotAllowed(name.to_string()));
            }
        }
        match &self.column_rewrite {
            Some(rewrite) => rewrite(name).map_err(|reason| SqlError::Rewrite {
                target: format!("column {}", name),
                reason,
            }),
            None => Ok(name.to_string()),
        }
    }

    /// Apply the value rewrite to a string compared against `column`
    pub fn value(&self, column: &str, value: &str) -> Result<String> {
        match &self.value_rewrite {
            Some(rewrite) => rewrite(column, value).map_err(|reason| SqlError::Rewrite {
                target: format!("value of {}", column),
                reason,
            }),
            None => Ok(value.to_string()),
        }
    }
}

/// File-loadable subset of [`QueryConfig`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct QuerySettings {
    pub page_size: usize,
    pub bucket_count: usize,
    pub compatibility_mode: bool,
    /// Column whitelist, empty means every column is allowed
    pub allowed_columns: Vec<String>,
    /// Column renames applied before emission
    pub column_aliases: BTreeMap<String, String>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bucket_count: DEFAULT_BUCKET_COUNT,
            compatibility_mode: false,
            allowed_columns: Vec::new(),
            column_aliases: BTreeMap::new(),
        }
    }
}

impl QuerySettings {
    pub fn into_config(self) -> QueryConfig {
        let column_filter: Option<ColumnFilter> = if self.allowed_columns.is_empty() {
            None
        } else {
            let allowed: HashSet<String> = self.allowed_columns.into_iter().collect();
            Some(Arc::new(move |name: &str| allowed.contains(name)))
        };

        let column_rewrite: Option<ColumnRewrite> = if self.column_aliases.is_empty() {
            None
        } else {
            let aliases = self.column_aliases;
            Some(Arc::new(move |name: &str| {
                Ok(aliases
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| name.to_string()))
            }))
        };

        QueryConfig {
            page_size: self.page_size,
            bucket_count: self.bucket_count,
            compatibility_mode: self.compatibility_mode,
            column_filter,
            column_rewrite,
            value_rewrite: None,
        }
    }
}
