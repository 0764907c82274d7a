//! Normalized, request-scoped query descriptor.
//!
//! A [`QueryDescriptor`] is built fresh for every grid request by the
//! [`crate::RequestNormalizer`], optionally adjusted by the `before_request`
//! hook, then rendered by the [`crate::QueryBuilder`]. Neither the builder nor
//! the reshaper know which grid request shape it came from.

use serde_json::Value;

use crate::SortDir;
use crate::operators::AggregationKind;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterKind {
    Text,
    Number,
    Date,
    Set,
}

impl FilterKind {
    #[must_use]
    pub fn from_grid_name(name: &str) -> Option<Self> {
        match name {
            "text" => Some(Self::Text),
            "number" => Some(Self::Number),
            "date" => Some(Self::Date),
            "set" => Some(Self::Set),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorKind {
    Equals,
    NotEqual,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    InRange,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    Blank,
    NotBlank,
    In,
    NotIn,
}

impl OperatorKind {
    /// Parse a grid filter `type`.
    #[must_use]
    pub fn from_grid_name(name: &str) -> Option<Self> {
        Some(match name {
            "equals" => Self::Equals,
            "notEqual" => Self::NotEqual,
            "lessThan" => Self::LessThan,
            "lessThanOrEqual" => Self::LessThanOrEqual,
            "greaterThan" => Self::GreaterThan,
            "greaterThanOrEqual" => Self::GreaterThanOrEqual,
            "inRange" => Self::InRange,
            "contains" => Self::Contains,
            "notContains" => Self::NotContains,
            "startsWith" => Self::StartsWith,
            "endsWith" => Self::EndsWith,
            "blank" => Self::Blank,
            "notBlank" => Self::NotBlank,
            "in" => Self::In,
            "notIn" => Self::NotIn,
            _ => return None,
        })
    }

    /// Number of operands the operator consumes (`None` = a list).
    #[must_use]
    pub fn arity(self) -> Option<usize> {
        match self {
            Self::Blank | Self::NotBlank => Some(0),
            Self::InRange => Some(2),
            Self::In | Self::NotIn => None,
            _ => Some(1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinOperator {
    And,
    Or,
}

impl JoinOperator {
    #[must_use]
    pub fn from_grid_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("and") {
            Some(Self::And)
        } else if name.eq_ignore_ascii_case("or") {
            Some(Self::Or)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterPredicate {
    /// One operator with its operands (none, one, two, or a list for sets).
    Condition {
        operator: OperatorKind,
        operands: Vec<Value>,
    },
    /// Several conditions on the same column joined by AND/OR.
    Combined {
        join: JoinOperator,
        conditions: Vec<FilterPredicate>,
    },
}

impl FilterPredicate {
    #[must_use]
    pub fn condition(operator: OperatorKind, operands: Vec<Value>) -> Self {
        FilterPredicate::Condition { operator, operands }
    }
}

/// One filtered column.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterDescriptor {
    pub column: String,
    pub kind: FilterKind,
    pub case_sensitive: bool,
    pub predicate: FilterPredicate,
}

impl FilterDescriptor {
    #[must_use]
    pub fn new(column: impl Into<String>, kind: FilterKind, predicate: FilterPredicate) -> Self {
        Self {
            column: column.into(),
            kind,
            case_sensitive: false,
            predicate,
        }
    }

    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub dir: SortDir,
}

impl SortKey {
    #[must_use]
    pub fn new(column: impl Into<String>, dir: SortDir) -> Self {
        Self {
            column: column.into(),
            dir,
        }
    }
}

/// Row-group columns plus the currently expanded group path.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupSpec {
    pub columns: Vec<String>,
    pub keys: Vec<Value>,
    /// Ask the backend for a per-bucket child count.
    pub count_children: bool,
}

impl Default for GroupSpec {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            keys: Vec::new(),
            count_children: true,
        }
    }
}

impl GroupSpec {
    #[must_use]
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_keys(mut self, keys: Vec<Value>) -> Self {
        self.keys = keys;
        self
    }

    /// The next pending group column, if the request is not at leaf level.
    #[must_use]
    pub fn active_column(&self) -> Option<&str> {
        self.columns.get(self.keys.len()).map(String::as_str)
    }

    /// Group columns still pending below the current path, active one first.
    #[must_use]
    pub fn pending_columns(&self) -> &[String] {
        self.columns.get(self.keys.len()..).unwrap_or_default()
    }

    /// Expanded `(column, key)` pairs along the current group path.
    #[must_use]
    pub fn expanded(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(String::as_str).zip(self.keys.iter())
    }
}

/// One aggregated value column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValueColumn {
    pub column: String,
    pub aggregation: AggregationKind,
    pub alias: Option<String>,
}

impl ValueColumn {
    #[must_use]
    pub fn new(column: impl Into<String>, aggregation: AggregationKind) -> Self {
        Self {
            column: column.into(),
            aggregation,
            alias: None,
        }
    }

    #[must_use]
    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Output field name; defaults to the column.
    #[must_use]
    pub fn alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

/// Pivot columns and value-column aggregation requests.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PivotSpec {
    pub pivot_mode: bool,
    pub columns: Vec<String>,
    pub values: Vec<ValueColumn>,
}

impl PivotSpec {
    /// Pivoting happens only in pivot mode with at least one pivot column.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.pivot_mode && !self.columns.is_empty()
    }
}

/// `(skip, top)` window; `top = None` means unbounded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageWindow {
    pub skip: u64,
    pub top: Option<u64>,
}

impl PageWindow {
    #[must_use]
    pub fn new(skip: u64, top: Option<u64>) -> Self {
        Self { skip, top }
    }

    /// Window covering grid rows `[start, end)`.
    #[must_use]
    pub fn from_rows(start: u64, end: Option<u64>) -> Self {
        Self {
            skip: start,
            top: end.map(|e| e.saturating_sub(start)),
        }
    }
}

/// Caller-injected raw fragments, merged after the structural clauses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryExtend {
    pub select: Vec<String>,
    pub expand: Vec<String>,
    /// Raw boolean fragments ANDed with the generated filters.
    pub filter: Vec<String>,
    /// Extra `name=value` parameters; structural names are ignored.
    pub params: Vec<(String, String)>,
}

impl QueryExtend {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.select.is_empty()
            && self.expand.is_empty()
            && self.filter.is_empty()
            && self.params.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
#[must_use]
pub struct QueryDescriptor {
    pub filters: Vec<FilterDescriptor>,
    pub sort: Vec<SortKey>,
    pub group: GroupSpec,
    pub pivot: PivotSpec,
    pub page: Option<PageWindow>,
    /// Ask for `$count=true` (ignored for grouped requests).
    pub count: bool,
    pub extend: QueryExtend,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterDescriptor) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    pub fn with_group(mut self, group: GroupSpec) -> Self {
        self.group = group;
        self
    }

    pub fn with_pivot(mut self, pivot: PivotSpec) -> Self {
        self.pivot = pivot;
        self
    }

    pub fn with_values(mut self, values: Vec<ValueColumn>) -> Self {
        self.pivot.values = values;
        self
    }

    pub fn with_page(mut self, page: PageWindow) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    pub fn with_extend(mut self, extend: QueryExtend) -> Self {
        self.extend = extend;
        self
    }

    /// Whether the request asks for buckets rather than leaf rows.
    #[must_use]
    pub fn is_grouped(&self) -> bool {
        self.group.active_column().is_some() || self.pivot.is_active()
    }

    /// Columns emitted in the `groupby` list: next pending group level plus
    /// pivot columns when pivoting.
    #[must_use]
    pub fn grouped_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.group.active_column().into_iter().collect();
        if self.pivot.is_active() {
            for col in &self.pivot.columns {
                if !cols.contains(&col.as_str()) {
                    cols.push(col);
                }
            }
        }
        cols
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_active_column_follows_group_keys() {
        let group = GroupSpec::new(["country", "city"]);
        assert_eq!(group.active_column(), Some("country"));
        assert_eq!(group.pending_columns(), ["country", "city"]);

        let group = group.with_keys(vec![json!("France")]);
        assert_eq!(group.active_column(), Some("city"));
        assert_eq!(group.pending_columns(), ["city"]);

        let group = group.with_keys(vec![json!("France"), json!("Paris")]);
        assert_eq!(group.active_column(), None);
        assert!(group.pending_columns().is_empty());
    }

    #[test]
    fn test_expanded_pairs() {
        let group = GroupSpec::new(["country", "city"]).with_keys(vec![json!("France")]);
        let pairs: Vec<_> = group.expanded().collect();
        assert_eq!(pairs, vec![("country", &json!("France"))]);
    }

    #[test]
    fn test_grouped_columns_with_pivot() {
        let d = QueryDescriptor::new()
            .with_group(GroupSpec::new(["country"]))
            .with_pivot(PivotSpec {
                pivot_mode: true,
                columns: vec!["year".to_owned()],
                values: vec![],
            });
        assert!(d.is_grouped());
        assert_eq!(d.grouped_columns(), vec!["country", "year"]);
    }

    #[test]
    fn test_pivot_inactive_without_mode() {
        let d = QueryDescriptor::new().with_pivot(PivotSpec {
            pivot_mode: false,
            columns: vec!["year".to_owned()],
            values: vec![],
        });
        assert!(!d.is_grouped());
        assert!(d.grouped_columns().is_empty());
    }

    #[test]
    fn test_page_from_rows() {
        assert_eq!(PageWindow::from_rows(20, Some(30)), PageWindow::new(20, Some(10)));
        assert_eq!(PageWindow::from_rows(5, None), PageWindow::new(5, None));
        assert_eq!(PageWindow::from_rows(5, Some(2)).top, Some(0));
    }

    #[test]
    fn test_value_column_alias_defaults_to_column() {
        let v = ValueColumn::new("amount", AggregationKind::Sum);
        assert_eq!(v.alias(), "amount");
        assert_eq!(v.with_alias("total").alias(), "total");
    }

    #[test]
    fn test_operator_names() {
        assert_eq!(OperatorKind::from_grid_name("inRange"), Some(OperatorKind::InRange));
        assert_eq!(OperatorKind::InRange.arity(), Some(2));
        assert_eq!(OperatorKind::In.arity(), None);
        assert_eq!(OperatorKind::from_grid_name("between"), None);
        assert_eq!(JoinOperator::from_grid_name("OR"), Some(JoinOperator::Or));
    }
}
