//! Data options shared by the normalizer, the query builder and the reshaper.
//!
//! Hooks are not part of this struct; they are wired by the SDK provider.

use serde::{Deserialize, Serialize};

/// Configuration for `OData` translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GridODataConfig {
    /// Field the backend uses to report per-bucket child counts (default: `childCount`)
    pub group_count_field_name: String,
    /// Global default for string comparisons (default: false, i.e. case-folded)
    pub is_case_sensitive_string_filter: bool,
    /// Columns forced to case-sensitive comparison regardless of the global default
    pub case_sensitive_columns: Vec<String>,
    /// Response field holding the total record count (default: `@odata.count`)
    pub count_field_name: String,
    /// Response field holding the record list (default: `value`)
    pub result_field_name: String,
    /// Emit `$count=true` on flat requests (default: true)
    pub request_count: bool,
}

impl Default for GridODataConfig {
    fn default() -> Self {
        Self {
            group_count_field_name: default_group_count_field_name(),
            is_case_sensitive_string_filter: false,
            case_sensitive_columns: Vec::new(),
            count_field_name: default_count_field_name(),
            result_field_name: default_result_field_name(),
            request_count: true,
        }
    }
}

fn default_group_count_field_name() -> String {
    "childCount".to_owned()
}

fn default_count_field_name() -> String {
    "@odata.count".to_owned()
}

fn default_result_field_name() -> String {
    "value".to_owned()
}

impl GridODataConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_group_count_field_name(mut self, name: impl Into<String>) -> Self {
        self.group_count_field_name = name.into();
        self
    }

    #[must_use]
    pub fn with_case_sensitive_string_filter(mut self, enabled: bool) -> Self {
        self.is_case_sensitive_string_filter = enabled;
        self
    }

    #[must_use]
    pub fn with_case_sensitive_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.case_sensitive_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_request_count(mut self, enabled: bool) -> Self {
        self.request_count = enabled;
        self
    }

    /// Resolve case sensitivity for a column.
    ///
    /// The override list is consulted first; the first entry naming the
    /// column wins. Columns not listed fall back to the global flag.
    #[must_use]
    pub fn is_case_sensitive(&self, column: &str) -> bool {
        self.case_sensitive_columns
            .iter()
            .find(|c| c.as_str() == column)
            .map_or(self.is_case_sensitive_string_filter, |_| true)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GridODataConfig::default();
        assert_eq!(config.group_count_field_name, "childCount");
        assert!(!config.is_case_sensitive_string_filter);
        assert!(config.case_sensitive_columns.is_empty());
        assert_eq!(config.count_field_name, "@odata.count");
        assert_eq!(config.result_field_name, "value");
        assert!(config.request_count);
    }

    #[test]
    fn test_override_list_beats_global_default() {
        let config = GridODataConfig::new().with_case_sensitive_columns(["code"]);
        assert!(config.is_case_sensitive("code"));
        assert!(!config.is_case_sensitive("name"));

        let config = config.with_case_sensitive_string_filter(true);
        assert!(config.is_case_sensitive("name"));
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: GridODataConfig = serde_json::from_value(serde_json::json!({
            "group_count_field_name": "cnt",
            "case_sensitive_columns": ["sku"]
        }))
        .unwrap();

        assert_eq!(config.group_count_field_name, "cnt");
        assert!(config.is_case_sensitive("sku"));
        assert_eq!(config.result_field_name, "value");
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let res: Result<GridODataConfig, _> =
            serde_json::from_value(serde_json::json!({ "unknown": 1 }));
        assert!(res.is_err());
    }
}
