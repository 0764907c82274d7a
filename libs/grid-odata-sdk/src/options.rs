//! Provider options: data configuration plus the hook slots.
//!
//! Each hook fires at exactly one point of a row request:
//!
//! | hook                           | fires                                        |
//! |--------------------------------|----------------------------------------------|
//! | `before_request`               | once per query build, before rendering       |
//! | `before_set_secondary_columns` | after a pivot reshape, before rows are returned |
//! | `after_load_data`              | after every successful reshape               |
//! | `set_error`                    | on transport or response decoding failure    |

use std::fmt;
use std::sync::Arc;

use grid_odata::{BeforeRequestHook, ColumnDef, GridODataConfig, GridRequest, GridRow, QueryDescriptor};

use crate::error::ProviderError;

/// Receives the synthesized pivot column tree and may edit it in place.
pub type SecondaryColumnsHook = Arc<dyn Fn(&mut Vec<ColumnDef>) + Send + Sync>;

/// Receives `(descriptor, rows, total_count)` after a successful load.
pub type AfterLoadDataHook = Arc<dyn Fn(&QueryDescriptor, &[GridRow], u64) + Send + Sync>;

/// Receives the failure together with the grid request that caused it.
pub type SetErrorHook = Arc<dyn Fn(&ProviderError, &GridRequest) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ProviderOptions {
    pub config: GridODataConfig,
    pub before_request: Option<BeforeRequestHook>,
    pub before_set_secondary_columns: Option<SecondaryColumnsHook>,
    pub after_load_data: Option<AfterLoadDataHook>,
    pub set_error: Option<SetErrorHook>,
}

impl fmt::Debug for ProviderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderOptions")
            .field("config", &self.config)
            .field("before_request", &self.before_request.is_some())
            .field(
                "before_set_secondary_columns",
                &self.before_set_secondary_columns.is_some(),
            )
            .field("after_load_data", &self.after_load_data.is_some())
            .field("set_error", &self.set_error.is_some())
            .finish()
    }
}

impl ProviderOptions {
    #[must_use]
    pub fn new(config: GridODataConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }
}
