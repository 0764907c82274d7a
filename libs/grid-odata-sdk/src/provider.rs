//! Provider facade: normalize, build, call, reshape, notify.
//!
//! # Example
//!
//! ```rust,ignore
//! use grid_odata_sdk::{GridODataProvider, TransportError};
//!
//! let provider = GridODataProvider::builder(|query: String| async move {
//!     let url = format!("https://api.example.com/odata/Orders{query}");
//!     let body: serde_json::Value = http_get_json(&url).await?;
//!     Ok::<_, TransportError>(body)
//! })
//! .with_after_load_data(Arc::new(|_descriptor, rows, total| {
//!     tracing::info!(rows = rows.len(), total, "rows loaded");
//! }))
//! .build();
//!
//! let loaded = provider.get_rows_json(&grid_params).await?;
//! ```

use std::future::Future;

use grid_odata::reshape::distinct_values;
use grid_odata::{
    BeforeRequestHook, ColumnDef, GridODataConfig, GridRequest, GridRow, GroupSpec, QueryBuilder,
    QueryDescriptor, RawResultSet, RequestNormalizer, ResultReshaper,
};
use serde_json::Value;

use crate::cancel::CancelHandle;
use crate::error::ProviderError;
use crate::options::{AfterLoadDataHook, ProviderOptions, SecondaryColumnsHook, SetErrorHook};
use crate::transport::ODataTransport;

/// Rows for one grid request, ready to hand back to the grid.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedRows {
    pub rows: Vec<GridRow>,
    pub total_count: u64,
    /// Present for pivot requests, after `before_set_secondary_columns` ran.
    pub secondary_columns: Option<Vec<ColumnDef>>,
    /// The query string sent to the transport.
    pub query: String,
}

impl LoadedRows {
    /// Rows flattened into grid records.
    #[must_use]
    pub fn records(&self, count_field: &str) -> Vec<Value> {
        self.rows.iter().map(|r| r.to_record(count_field)).collect()
    }
}

/// Fluent builder for [`GridODataProvider`].
pub struct GridODataProviderBuilder<T> {
    transport: T,
    options: ProviderOptions,
}

impl<T: ODataTransport> GridODataProviderBuilder<T> {
    #[must_use]
    pub fn with_config(mut self, config: GridODataConfig) -> Self {
        self.options.config = config;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_before_request(mut self, hook: BeforeRequestHook) -> Self {
        self.options.before_request = Some(hook);
        self
    }

    #[must_use]
    pub fn with_before_set_secondary_columns(mut self, hook: SecondaryColumnsHook) -> Self {
        self.options.before_set_secondary_columns = Some(hook);
        self
    }

    #[must_use]
    pub fn with_after_load_data(mut self, hook: AfterLoadDataHook) -> Self {
        self.options.after_load_data = Some(hook);
        self
    }

    #[must_use]
    pub fn with_set_error(mut self, hook: SetErrorHook) -> Self {
        self.options.set_error = Some(hook);
        self
    }

    #[must_use]
    pub fn build(self) -> GridODataProvider<T> {
        let mut builder = QueryBuilder::new(self.options.config.clone());
        if let Some(hook) = &self.options.before_request {
            builder = builder.with_before_request(hook.clone());
        }
        GridODataProvider {
            transport: self.transport,
            options: self.options,
            builder,
        }
    }
}

/// Grid data provider over an `OData` transport.
///
/// Holds no state between requests; concurrent requests run independently
/// and results apply in resolution order.
pub struct GridODataProvider<T> {
    transport: T,
    options: ProviderOptions,
    builder: QueryBuilder,
}

impl<T> std::fmt::Debug for GridODataProvider<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridODataProvider")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<T: ODataTransport> GridODataProvider<T> {
    #[must_use]
    pub fn builder(transport: T) -> GridODataProviderBuilder<T> {
        GridODataProviderBuilder {
            transport,
            options: ProviderOptions::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &GridODataConfig {
        &self.options.config
    }

    /// Normalize a grid request without running hooks.
    ///
    /// # Errors
    /// Translation errors from the normalizer.
    pub fn odata_options(&self, request: &GridRequest) -> Result<QueryDescriptor, ProviderError> {
        Ok(RequestNormalizer::new(self.config()).normalize(request)?)
    }

    /// Normalize, run `before_request`, and render the query string.
    ///
    /// # Errors
    /// Translation errors from the normalizer or the builder.
    pub fn odata_query(
        &self,
        request: &GridRequest,
    ) -> Result<(QueryDescriptor, String), ProviderError> {
        let mut descriptor = self.odata_options(request)?;
        let query = self.builder.build(&mut descriptor, request)?;
        Ok((descriptor, query))
    }

    /// Fetch and reshape the rows for one grid request.
    ///
    /// Translation errors are returned without calling `set_error`;
    /// transport and response failures go through `set_error` first.
    ///
    /// # Errors
    /// See [`ProviderError`].
    pub async fn get_rows(&self, request: &GridRequest) -> Result<LoadedRows, ProviderError> {
        self.load(request, None).await
    }

    /// Decode a raw grid payload, then [`GridODataProvider::get_rows`].
    ///
    /// # Errors
    /// `grid_odata::Error::UnrecognizedRequest` for unknown payloads, plus
    /// everything `get_rows` returns.
    pub async fn get_rows_json(&self, params: &Value) -> Result<LoadedRows, ProviderError> {
        let request = GridRequest::from_value(params)?;
        self.load(&request, None).await
    }

    /// Like [`GridODataProvider::get_rows`], with a handle that can mark the
    /// request canceled. A canceled request resolves to
    /// [`ProviderError::Canceled`] and skips every post-load hook.
    #[must_use]
    pub fn get_rows_cancelable(
        &self,
        request: GridRequest,
    ) -> (
        CancelHandle,
        impl Future<Output = Result<LoadedRows, ProviderError>> + Send + '_,
    ) {
        let handle = CancelHandle::new();
        let observed = handle.clone();
        let fut = async move { self.load(&request, Some(&observed)).await };
        (handle, fut)
    }

    /// Distinct values of one column for set-filter UIs.
    ///
    /// Issues a bare `groupby` over the column: no aggregates, no paging.
    ///
    /// # Errors
    /// Transport failures and undecodable responses.
    pub async fn filter_values(&self, field: &str) -> Result<Vec<Value>, ProviderError> {
        self.filter_values_with(field, |_| {}).await
    }

    /// Like [`GridODataProvider::filter_values`], with `customize` applied to
    /// the descriptor once before rendering (tenant filters, `$expand`, ...).
    /// The provider-wide `before_request` hook is not run for this query.
    ///
    /// # Errors
    /// Transport failures and undecodable responses.
    pub async fn filter_values_with<F>(
        &self,
        field: &str,
        customize: F,
    ) -> Result<Vec<Value>, ProviderError>
    where
        F: FnOnce(&mut QueryDescriptor),
    {
        let mut group = GroupSpec::new([field]);
        group.count_children = false;
        let mut descriptor = QueryDescriptor::new().with_group(group);
        customize(&mut descriptor);
        let query = self.builder.to_query(&descriptor)?;

        let response = self.transport.call_api(&query).await.map_err(|e| {
            tracing::error!(target: "grid_odata_sdk::provider", error = %e, %query, "filter values request failed");
            ProviderError::Transport(e)
        })?;
        let raw = RawResultSet::from_response(response, self.config())?;
        Ok(distinct_values(&raw.records, field))
    }

    async fn load(
        &self,
        request: &GridRequest,
        cancel: Option<&CancelHandle>,
    ) -> Result<LoadedRows, ProviderError> {
        let (descriptor, query) = self.odata_query(request)?;
        tracing::debug!(target: "grid_odata_sdk::provider", %query, "requesting rows");

        let outcome = self.fetch(&query).await;
        if cancel.is_some_and(CancelHandle::is_canceled) {
            tracing::debug!(target: "grid_odata_sdk::provider", %query, "request canceled, discarding result");
            return Err(ProviderError::Canceled);
        }

        let raw = match outcome {
            Ok(raw) => raw,
            Err(err) => {
                tracing::error!(target: "grid_odata_sdk::provider", error = %err, %query, "row request failed");
                if let Some(hook) = &self.options.set_error {
                    hook(&err, request);
                }
                return Err(err);
            }
        };

        let mut reshaped = ResultReshaper::new(self.config()).reshape(raw, &descriptor);
        if let (Some(columns), Some(hook)) = (
            reshaped.secondary_columns.as_mut(),
            &self.options.before_set_secondary_columns,
        ) {
            hook(columns);
        }
        if let Some(hook) = &self.options.after_load_data {
            hook(&descriptor, &reshaped.rows, reshaped.total_count);
        }

        Ok(LoadedRows {
            rows: reshaped.rows,
            total_count: reshaped.total_count,
            secondary_columns: reshaped.secondary_columns,
            query,
        })
    }

    async fn fetch(&self, query: &str) -> Result<RawResultSet, ProviderError> {
        let response = self
            .transport
            .call_api(query)
            .await
            .map_err(ProviderError::Transport)?;
        Ok(RawResultSet::from_response(response, self.config())?)
    }
}
