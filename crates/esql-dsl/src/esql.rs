//! Public conversion entry point

use crate::config::QueryConfig;
use crate::error::{Result, SqlError};
use crate::parser::SqlParser;
use crate::translator::{SqlTranslator, Translation};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Converted DSL text and the fields it sorts on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversion {
    pub dsl: String,
    /// Sort field names, for building `search_after` values of the next page
    pub sort_fields: Vec<String>,
}

/// SQL to Elasticsearch DSL converter
///
/// Configuration is changed through `&mut self`, so it can never change
/// under an in-flight conversion. Share a configured converter by reference
/// or behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct Esql {
    config: QueryConfig,
}

impl Esql {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: QueryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// Convert `sql` into compact DSL JSON
    ///
    /// `search_after` values, when given, continue a previous page and must
    /// match the returned sort fields one to one.
    pub fn convert(&self, sql: &str, search_after: &[Value]) -> Result<Conversion> {
        let translation = self.translate(sql, search_after)?;
        Ok(Conversion {
            dsl: serde_json::to_string(&translation.dsl)?,
            sort_fields: translation.sort_fields,
        })
    }

    /// Same as [`Esql::convert`], indented with two spaces
    pub fn convert_pretty(&self, sql: &str, search_after: &[Value]) -> Result<Conversion> {
        let translation = self.translate(sql, search_after)?;
        Ok(Conversion {
            dsl: serde_json::to_string_pretty(&translation.dsl)?,
            sort_fields: translation.sort_fields,
        })
    }

    /// Convert `sql` into a DSL value without serializing it
    pub fn translate(&self, sql: &str, search_after: &[Value]) -> Result<Translation> {
        debug!("Converting SQL: {}", sql);
        let stmt = SqlParser::parse_select(sql)?;
        SqlTranslator::new(&self.config).translate(&stmt, search_after)
    }

    pub fn set_column_filter<F>(&mut self, filter: F)
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.config.column_filter = Some(Arc::new(filter));
    }

    pub fn set_column_rewrite<F>(&mut self, rewrite: F)
    where
        F: Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.config.column_rewrite = Some(Arc::new(rewrite));
    }

    pub fn set_value_rewrite<F>(&mut self, rewrite: F)
    where
        F: Fn(&str, &str) -> std::result::Result<String, String> + Send + Sync + 'static,
    {
        self.config.value_rewrite = Some(Arc::new(rewrite));
    }

    pub fn set_page_size(&mut self, page_size: usize) -> Result<()> {
        if page_size == 0 {
            return Err(SqlError::InvalidConfig(
                "page_size must be positive".to_string(),
            ));
        }
        self.config.page_size = page_size;
        Ok(())
    }

    pub fn set_bucket_count(&mut self, bucket_count: usize) -> Result<()> {
        if bucket_count == 0 {
            return Err(SqlError::InvalidConfig(
                "bucket_count must be positive".to_string(),
            ));
        }
        self.config.bucket_count = bucket_count;
        Ok(())
    }

    pub fn set_compatibility_mode(&mut self, enabled: bool) {
        self.config.compatibility_mode = enabled;
    }
}
