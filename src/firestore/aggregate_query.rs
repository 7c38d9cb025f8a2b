//! Firestore Aggregation Query support
//!
//! Count, sum and average over the documents a query matches, computed by
//! the driver without shipping the documents themselves.

use super::driver::Driver;
use super::field_value::Fields;
use super::query::StructuredQuery;
use crate::error::FirestoreError;
use serde_json::{Number, Value};
use std::sync::Arc;

/// Type of aggregation operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationType {
    /// Count the number of documents
    Count,
    /// Sum a numeric field across documents
    Sum(String),
    /// Average a numeric field across documents
    Average(String),
}

/// Field specification for aggregation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateField {
    /// Alias for the aggregation result (optional)
    pub alias: Option<String>,
    /// Type of aggregation
    pub aggregation_type: AggregationType,
}

impl AggregateField {
    /// Create a count aggregation
    pub fn count() -> Self {
        Self {
            alias: None,
            aggregation_type: AggregationType::Count,
        }
    }

    /// Create a sum aggregation on a field
    pub fn sum(field: impl Into<String>) -> Self {
        Self {
            alias: None,
            aggregation_type: AggregationType::Sum(field.into()),
        }
    }

    /// Create an average aggregation on a field
    pub fn average(field: impl Into<String>) -> Self {
        Self {
            alias: None,
            aggregation_type: AggregationType::Average(field.into()),
        }
    }

    /// Set an alias for this aggregation field
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Key the result is reported under
    ///
    /// Defaults to `count`, `sum_<field>` and `average_<field>`.
    pub fn result_alias(&self) -> String {
        if let Some(alias) = &self.alias {
            return alias.clone();
        }
        match &self.aggregation_type {
            AggregationType::Count => "count".to_string(),
            AggregationType::Sum(field) => format!("sum_{}", field),
            AggregationType::Average(field) => format!("average_{}", field),
        }
    }
}

/// Aggregation query for performing aggregate operations on collections
#[derive(Clone)]
pub struct AggregateQuery {
    driver: Arc<dyn Driver>,
    query: StructuredQuery,
    aggregations: Vec<AggregateField>,
}

impl AggregateQuery {
    /// Create a new aggregation query
    pub fn new(
        driver: Arc<dyn Driver>,
        query: StructuredQuery,
        aggregations: Vec<AggregateField>,
    ) -> Self {
        Self {
            driver,
            query,
            aggregations,
        }
    }

    /// The aggregated query
    pub fn query(&self) -> &StructuredQuery {
        &self.query
    }

    /// Execute the aggregation query and return results
    pub async fn get(&self) -> Result<AggregateQuerySnapshot, FirestoreError> {
        tracing::debug!(
            target: "firestore_odm::aggregate",
            collection = %self.query.collection_path,
            aggregations = self.aggregations.len(),
            "running aggregation"
        );
        let results = self
            .driver
            .run_aggregation(&self.query, &self.aggregations)
            .await?;
        Ok(AggregateQuerySnapshot { results })
    }
}

/// Snapshot of aggregation query results
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregateQuerySnapshot {
    results: Fields,
}

impl AggregateQuerySnapshot {
    /// Wrap raw results keyed by alias
    pub fn new(results: Fields) -> Self {
        Self { results }
    }

    /// Get count result (convenience method for count aggregations)
    pub fn count(&self) -> Option<i64> {
        self.get_int("count")
    }

    /// Get a specific aggregation result by alias
    pub fn get(&self, alias: &str) -> Option<&Value> {
        self.results.get(alias)
    }

    /// Get integer value from aggregation result
    pub fn get_int(&self, alias: &str) -> Option<i64> {
        self.get(alias).and_then(Value::as_i64)
    }

    /// Get double value from aggregation result
    pub fn get_double(&self, alias: &str) -> Option<f64> {
        self.get(alias).and_then(Value::as_f64)
    }

    /// Get a numeric result, keeping integer sums exact
    pub fn get_number(&self, alias: &str) -> Option<&Number> {
        match self.get(alias) {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        }
    }

    /// Get all aggregation results
    pub fn results(&self) -> &Fields {
        &self.results
    }
}
