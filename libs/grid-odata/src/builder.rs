//! `OData` query builder
//!
//! Renders a [`QueryDescriptor`] into a query string. Clauses are emitted in a
//! fixed order: `$filter` (or `$apply` with a leading `filter(...)` step for
//! grouped requests), `$orderby`, `$skip`, `$top`, `$count`, then the extend
//! fragments (`$select`, `$expand`, custom parameters).
//!
//! # Example
//!
//! ```rust,ignore
//! use grid_odata::{GridODataConfig, QueryBuilder, QueryDescriptor, PageWindow, SortKey, SortDir};
//!
//! let query = QueryBuilder::new(GridODataConfig::default()).to_query(
//!     &QueryDescriptor::new()
//!         .with_sort(SortKey::new("amount", SortDir::Desc))
//!         .with_page(PageWindow::new(0, Some(2))),
//! )?;
//! assert_eq!(query, "?$orderby=amount desc&$skip=0&$top=2");
//! ```

use std::sync::Arc;

use serde_json::Value;

use crate::config::GridODataConfig;
use crate::descriptor::{
    FilterDescriptor, FilterKind, FilterPredicate, OperatorKind, QueryDescriptor, SortKey,
};
use crate::literal::{
    display_text, encode, encode_date, encode_date_only, encode_number, encode_value, is_str_val,
};
use crate::operators;
use crate::request::GridRequest;
use crate::{Error, SortDir};

/// Descriptor mutation hook, invoked once per query build before rendering.
pub type BeforeRequestHook = Arc<dyn Fn(&mut QueryDescriptor, &GridRequest) + Send + Sync>;

/// Parameters the extend bag may not override.
const STRUCTURAL_PARAMS: &[&str] = &["$filter", "$apply", "$orderby", "$skip", "$top", "$count"];

/// Encode a grid column path in `OData` notation (`a.b.c` -> `a/b/c`).
#[must_use]
pub fn wrap_column_name(column: &str) -> String {
    column.replace('.', "/")
}

#[derive(Clone)]
pub struct QueryBuilder {
    config: GridODataConfig,
    before_request: Option<BeforeRequestHook>,
}

impl std::fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("config", &self.config)
            .field("before_request", &self.before_request.is_some())
            .finish()
    }
}

impl QueryBuilder {
    #[must_use]
    pub fn new(config: GridODataConfig) -> Self {
        Self {
            config,
            before_request: None,
        }
    }

    #[must_use]
    pub fn with_before_request(mut self, hook: BeforeRequestHook) -> Self {
        self.before_request = Some(hook);
        self
    }

    #[must_use]
    pub fn config(&self) -> &GridODataConfig {
        &self.config
    }

    /// Run the `before_request` hook on the descriptor, then render it.
    ///
    /// The hook runs exactly once per call; callers retrying the transport
    /// must reuse the returned string instead of calling `build` again.
    ///
    /// # Errors
    /// Propagates [`QueryBuilder::to_query`] errors.
    pub fn build(
        &self,
        descriptor: &mut QueryDescriptor,
        request: &GridRequest,
    ) -> Result<String, Error> {
        if let Some(hook) = &self.before_request {
            hook(descriptor, request);
        }
        self.to_query(descriptor)
    }

    /// Render a descriptor into a query string (`?`-prefixed, or empty).
    ///
    /// # Errors
    /// Returns `Error::InvalidFilter` when a filter lacks the operands its
    /// operator needs.
    pub fn to_query(&self, descriptor: &QueryDescriptor) -> Result<String, Error> {
        let mut params: Vec<String> = Vec::new();
        let filters = filter_clauses(descriptor)?;
        let grouped = descriptor.is_grouped();

        if grouped {
            let mut apply = Vec::with_capacity(2);
            if !filters.is_empty() {
                apply.push(format!("filter({})", filters.join(" and ")));
            }
            apply.push(self.groupby_clause(descriptor));
            params.push(format!("$apply={}", apply.join("/")));
        } else if !filters.is_empty() {
            params.push(format!("$filter={}", filters.join(" and ")));
        }

        let order = self.order_keys(descriptor);
        if !order.is_empty() {
            let rendered: Vec<String> = order
                .iter()
                .map(|k| format!("{} {}", wrap_column_name(&k.column), k.dir))
                .collect();
            params.push(format!("$orderby={}", rendered.join(",")));
        }

        if let Some(page) = descriptor.page {
            if page.top.is_some() || page.skip > 0 {
                params.push(format!("$skip={}", page.skip));
            }
            if let Some(top) = page.top {
                params.push(format!("$top={top}"));
            }
        }

        if descriptor.count && !grouped {
            params.push("$count=true".to_owned());
        }

        let extend = &descriptor.extend;
        if !extend.select.is_empty() {
            params.push(format!("$select={}", extend.select.join(",")));
        }
        if !extend.expand.is_empty() {
            params.push(format!("$expand={}", extend.expand.join(",")));
        }
        for (name, value) in &extend.params {
            if STRUCTURAL_PARAMS
                .iter()
                .any(|p| p.eq_ignore_ascii_case(name.trim()))
            {
                tracing::warn!(
                    target: "grid_odata::builder",
                    param = %name,
                    "extend parameter collides with a structural clause, ignoring it"
                );
                continue;
            }
            params.push(format!("{name}={value}"));
        }

        let query = if params.is_empty() {
            String::new()
        } else {
            format!("?{}", params.join("&"))
        };
        tracing::debug!(target: "grid_odata::builder", %query, grouped, "built OData query");
        Ok(query)
    }

    fn groupby_clause(&self, descriptor: &QueryDescriptor) -> String {
        let cols: Vec<String> = descriptor
            .grouped_columns()
            .into_iter()
            .map(wrap_column_name)
            .collect();

        let mut aggregates: Vec<String> = descriptor
            .pivot
            .values
            .iter()
            .map(|v| {
                v.aggregation
                    .render(&wrap_column_name(&v.column), Some(v.alias()))
            })
            .collect();
        if descriptor.group.count_children {
            aggregates.push(operators::count(
                "",
                Some(&self.config.group_count_field_name),
            ));
        }

        if aggregates.is_empty() {
            format!("groupby(({}))", cols.join(","))
        } else {
            format!(
                "groupby(({}),aggregate({}))",
                cols.join(","),
                aggregates.join(",")
            )
        }
    }

    /// Effective sort order.
    ///
    /// Grouped requests sort by the active group column first (keeping the
    /// user's direction for it when given), then by user keys that exist in
    /// the grouped output. Other user keys are dropped.
    fn order_keys(&self, descriptor: &QueryDescriptor) -> Vec<SortKey> {
        if !descriptor.is_grouped() {
            return descriptor.sort.clone();
        }

        let grouped = descriptor.grouped_columns();
        let mut keys: Vec<SortKey> = Vec::with_capacity(descriptor.sort.len() + 1);
        if let Some(active) = descriptor.group.active_column() {
            let dir = descriptor
                .sort
                .iter()
                .find(|k| k.column == active)
                .map_or(SortDir::Asc, |k| k.dir);
            keys.push(SortKey::new(active, dir));
        }

        for key in &descriptor.sort {
            if keys.iter().any(|k| k.column == key.column) {
                continue;
            }
            let in_output = grouped.contains(&key.column.as_str())
                || descriptor.pivot.values.iter().any(|v| v.alias() == key.column)
                || key.column == self.config.group_count_field_name;
            if in_output {
                keys.push(key.clone());
            } else {
                tracing::warn!(
                    target: "grid_odata::builder",
                    column = %key.column,
                    "sort key is not part of the grouped output, dropping it"
                );
            }
        }
        keys
    }
}

/// All boolean clauses ANDed into the filter: user filters, group path
/// keys and raw extend fragments, in that order. Extend fragments are
/// parenthesized so an `or` inside one cannot escape the conjunction.
fn filter_clauses(descriptor: &QueryDescriptor) -> Result<Vec<String>, Error> {
    let mut clauses = Vec::new();
    for filter in &descriptor.filters {
        if let Some(expr) = filter_expression(filter)? {
            clauses.push(expr);
        }
    }
    for (column, key) in descriptor.group.expanded() {
        let col = wrap_column_name(column);
        clauses.push(operators::equals(&col, &encode_value(key)));
    }
    clauses.extend(
        descriptor
            .extend
            .filter
            .iter()
            .filter(|f| !f.trim().is_empty())
            .map(|f| format!("({})", f.trim())),
    );
    Ok(clauses)
}

/// Convert one column filter into an expression; `None` when it filters nothing.
///
/// # Errors
/// Returns `Error::InvalidFilter` when an operator lacks its operands.
pub fn filter_expression(filter: &FilterDescriptor) -> Result<Option<String>, Error> {
    let col = wrap_column_name(&filter.column);
    predicate_expression(&col, filter, &filter.predicate)
}

fn predicate_expression(
    col: &str,
    filter: &FilterDescriptor,
    predicate: &FilterPredicate,
) -> Result<Option<String>, Error> {
    match predicate {
        FilterPredicate::Condition { operator, operands } => {
            condition_expression(col, filter, *operator, operands).map(Some)
        }
        FilterPredicate::Combined { join, conditions } => {
            let mut parts = Vec::with_capacity(conditions.len());
            for condition in conditions {
                if let Some(expr) = predicate_expression(col, filter, condition)? {
                    parts.push(expr);
                }
            }
            Ok(match parts.len() {
                0 => None,
                1 => parts.pop(),
                _ => Some(format!(
                    "({})",
                    parts.join(&format!(" {} ", join.as_str()))
                )),
            })
        }
    }
}

fn condition_expression(
    col: &str,
    filter: &FilterDescriptor,
    operator: OperatorKind,
    operands: &[Value],
) -> Result<String, Error> {
    if let Some(expected) = operator.arity()
        && operands.len() < expected
    {
        return Err(Error::InvalidFilter {
            column: filter.column.clone(),
            reason: format!(
                "{operator:?} expects {expected} operand(s), got {}",
                operands.len()
            ),
        });
    }

    let cs = filter.case_sensitive;
    let literal = |idx: usize| operand_literal(filter.kind, &operands[idx]);
    let text = |idx: usize| encode(&display_text(&operands[idx]));
    let date_only = |idx: usize| {
        encode_date_only(&display_text(&operands[idx]))
            .as_str()
            .to_owned()
    };

    let expr = match operator {
        OperatorKind::Blank => operators::blank(col),
        OperatorKind::NotBlank => operators::not_blank(col),
        OperatorKind::Equals if filter.kind == FilterKind::Text => {
            operators::equals_str(col, &text(0), cs)
        }
        OperatorKind::NotEqual if filter.kind == FilterKind::Text => {
            operators::not_equal_str(col, &text(0), cs)
        }
        OperatorKind::Equals if filter.kind == FilterKind::Date => {
            operators::equals(&operators::trunc(col), &date_only(0))
        }
        OperatorKind::NotEqual if filter.kind == FilterKind::Date => {
            operators::not_equal(&operators::trunc(col), &date_only(0))
        }
        OperatorKind::Equals => operators::equals(col, &literal(0)),
        OperatorKind::NotEqual => operators::not_equal(col, &literal(0)),
        OperatorKind::LessThan => operators::less_than(col, &literal(0)),
        OperatorKind::LessThanOrEqual => operators::less_than_or_equal(col, &literal(0)),
        OperatorKind::GreaterThan => operators::greater_than(col, &literal(0)),
        OperatorKind::GreaterThanOrEqual => operators::greater_than_or_equal(col, &literal(0)),
        OperatorKind::InRange => operators::in_range(col, &literal(0), &literal(1)),
        OperatorKind::Contains => operators::contains(col, &text(0), cs),
        OperatorKind::NotContains => operators::not_contains(col, &text(0), cs),
        OperatorKind::StartsWith => operators::starts_with(col, &text(0), cs),
        OperatorKind::EndsWith => operators::ends_with(col, &text(0), cs),
        OperatorKind::In => {
            let values: Vec<String> = (0..operands.len()).map(literal).collect();
            if operands.iter().all(is_str_val) {
                operators::in_str(col, &values, cs)
            } else {
                operators::in_list(col, &values)
            }
        }
        OperatorKind::NotIn => {
            let values: Vec<String> = (0..operands.len()).map(literal).collect();
            operators::not_in(col, &values)
        }
    };
    Ok(expr)
}

fn operand_literal(kind: FilterKind, value: &Value) -> String {
    match (kind, value) {
        (FilterKind::Number, v) => encode_number(v),
        (FilterKind::Date, Value::String(s)) => encode_date(s).as_str().to_owned(),
        (FilterKind::Text, v) => encode(&display_text(v)),
        (_, v) => encode_value(v),
    }
}
