#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `grid-odata` - `OData` query translation for data grids
//!
//! Translates the row requests issued by a tabular grid (filter model, sort
//! model, row groups, pivot and value columns, row window) into `OData` v4
//! query strings, and reshapes the returned records back into flat rows or
//! group/pivot aggregates.
//!
//! The pipeline is:
//!
//! ```text
//! GridRequest -> RequestNormalizer -> QueryDescriptor -> QueryBuilder -> "?$filter=..."
//! response -> RawResultSet -> ResultReshaper -> Reshaped { rows, total_count }
//! ```
//!
//! No I/O happens here; the SDK crate owns the transport call and the hooks.
//!
//! ## Example
//!
//! ```rust,ignore
//! use grid_odata::{GridODataConfig, GridRequest, QueryBuilder, RequestNormalizer};
//!
//! let config = GridODataConfig::default();
//! let request = GridRequest::from_value(&params)?;
//! let descriptor = RequestNormalizer::new(&config).normalize(&request)?;
//! let query = QueryBuilder::new(config).to_query(&descriptor)?;
//! ```

pub mod builder;
pub mod columns;
pub mod config;
pub mod descriptor;
pub mod literal;
pub mod operators;
pub mod request;
pub mod reshape;

pub use builder::{BeforeRequestHook, QueryBuilder};
pub use columns::{ColumnDef, ColumnGroupDef, ColumnLeafDef};
pub use config::GridODataConfig;
pub use descriptor::{
    FilterDescriptor, FilterKind, FilterPredicate, GroupSpec, JoinOperator, OperatorKind,
    PageWindow, PivotSpec, QueryDescriptor, QueryExtend, SortKey, ValueColumn,
};
pub use literal::DateLiteral;
pub use operators::AggregationKind;
pub use request::{GridRequest, InfiniteRowsRequest, RequestNormalizer, ServerSideRowsRequest};
pub use reshape::{GridRow, GroupChildren, GroupRow, RawResultSet, Reshaped, ResultReshaper};

// Ordering primitives
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SortDir {
    #[serde(rename = "asc")]
    Asc,
    #[serde(rename = "desc")]
    Desc,
}

impl SortDir {
    /// `OData` keyword for this direction
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SortDir::Asc => "asc",
            SortDir::Desc => "desc",
        }
    }
}

impl std::fmt::Display for SortDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for query translation and reshaping.
///
/// Query-building failures are returned synchronously to the caller.
/// Transport failures never show up here; the SDK wraps them separately
/// so they can be forwarded to the error hook untouched.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The payload matches neither known grid request shape.
    #[error("unrecognized grid request: {0}")]
    UnrecognizedRequest(String),

    /// The payload has a known shape but its fields could not be decoded.
    #[error("invalid grid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported filter operator '{operator}' for column '{column}'")]
    UnsupportedOperator { column: String, operator: String },

    #[error("unsupported aggregation '{aggregation}' for column '{column}'")]
    UnsupportedAggregation { column: String, aggregation: String },

    #[error("invalid filter on column '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },

    /// The transport payload is neither a record array nor an object carrying one.
    #[error("invalid OData response: {0}")]
    InvalidResponse(String),
}
