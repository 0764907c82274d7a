#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! # `grid-odata-sdk` - grid data provider over an `OData` transport
//!
//! Wires the `grid-odata` translation pipeline to a caller-supplied
//! transport and the host's hooks:
//!
//! ```text
//! grid params -> GridRequest -> descriptor -> before_request -> query
//!     -> transport -> reshape -> before_set_secondary_columns -> after_load_data
//! ```
//!
//! Transport and response failures are reported through `set_error` and
//! returned; translation failures are only returned.

pub mod cancel;
pub mod error;
pub mod options;
pub mod provider;
pub mod transport;

pub use cancel::CancelHandle;
pub use error::ProviderError;
pub use options::{AfterLoadDataHook, ProviderOptions, SecondaryColumnsHook, SetErrorHook};
pub use provider::{GridODataProvider, GridODataProviderBuilder, LoadedRows};
pub use transport::{ODataTransport, TransportError};

pub use grid_odata;
