//! Grid request model and the Request Normalizer.
//!
//! Grids issue two request shapes: the infinite row model sends the
//! filter/sort model at the top level, the server-side row model nests an
//! equivalent payload under `request` together with row-group, pivot and
//! value column metadata. Both normalize to the same [`QueryDescriptor`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::GridODataConfig;
use crate::descriptor::{
    FilterDescriptor, FilterKind, FilterPredicate, GroupSpec, JoinOperator, OperatorKind,
    PageWindow, PivotSpec, QueryDescriptor, SortKey, ValueColumn,
};
use crate::operators::AggregationKind;
use crate::{Error, SortDir};

/// Column metadata as sent by the grid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnVo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agg_func: Option<String>,
}

impl ColumnVo {
    /// Data field for the column, falling back to its id.
    #[must_use]
    pub fn column(&self) -> &str {
        self.field.as_deref().unwrap_or(&self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortModelItem {
    pub col_id: String,
    pub sort: SortDir,
}

/// Filter model entry for one column.
///
/// Simple entries carry `type` plus operands; combined entries carry
/// `operator` (`AND`/`OR`) and either `condition1`/`condition2` or a
/// `conditions` list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnFilterModel {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_type: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub condition_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_to: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition1: Option<Box<ColumnFilterModel>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition2: Option<Box<ColumnFilterModel>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ColumnFilterModel>,
}

/// Column id -> filter. Ordered so the rendered `$filter` is deterministic.
pub type FilterModel = BTreeMap<String, ColumnFilterModel>;

/// Infinite row model request.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfiniteRowsRequest {
    #[serde(default)]
    pub start_row: Option<u64>,
    #[serde(default)]
    pub end_row: Option<u64>,
    #[serde(default)]
    pub sort_model: Vec<SortModelItem>,
    #[serde(default)]
    pub filter_model: Option<FilterModel>,
}

/// Server-side row model request (the object under `request`).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerSideRowsRequest {
    #[serde(default)]
    pub start_row: Option<u64>,
    #[serde(default)]
    pub end_row: Option<u64>,
    #[serde(default)]
    pub row_group_cols: Vec<ColumnVo>,
    #[serde(default)]
    pub value_cols: Vec<ColumnVo>,
    #[serde(default)]
    pub pivot_cols: Vec<ColumnVo>,
    #[serde(default)]
    pub pivot_mode: bool,
    #[serde(default)]
    pub group_keys: Vec<Value>,
    #[serde(default)]
    pub sort_model: Vec<SortModelItem>,
    #[serde(default)]
    pub filter_model: Option<FilterModel>,
}

/// One incoming grid request.
#[derive(Clone, Debug, PartialEq)]
pub enum GridRequest {
    Infinite(InfiniteRowsRequest),
    ServerSide(ServerSideRowsRequest),
}

const INFINITE_MARKERS: &[&str] = &["startRow", "endRow", "filterModel", "sortModel"];

impl GridRequest {
    /// Classify and decode a raw grid request payload.
    ///
    /// A `request` object marks the server-side shape; otherwise any of the
    /// infinite-model fields marks the infinite shape.
    ///
    /// # Errors
    /// `Error::UnrecognizedRequest` when neither shape matches,
    /// `Error::InvalidRequest` when the matched shape fails to decode.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let Some(obj) = value.as_object() else {
            return Err(Error::UnrecognizedRequest(format!(
                "expected an object, got {}",
                json_kind(value)
            )));
        };

        if let Some(inner) = obj.get("request").filter(|v| v.is_object()) {
            return ServerSideRowsRequest::deserialize(inner)
                .map(GridRequest::ServerSide)
                .map_err(|e| Error::InvalidRequest(e.to_string()));
        }

        if INFINITE_MARKERS.iter().any(|k| obj.contains_key(*k)) {
            return InfiniteRowsRequest::deserialize(value)
                .map(GridRequest::Infinite)
                .map_err(|e| Error::InvalidRequest(e.to_string()));
        }

        let mut keys: Vec<&str> = obj.keys().map(String::as_str).collect();
        keys.sort_unstable();
        Err(Error::UnrecognizedRequest(format!(
            "no known request fields among [{}]",
            keys.join(", ")
        )))
    }

    #[must_use]
    pub fn sort_model(&self) -> &[SortModelItem] {
        match self {
            GridRequest::Infinite(r) => &r.sort_model,
            GridRequest::ServerSide(r) => &r.sort_model,
        }
    }

    #[must_use]
    pub fn filter_model(&self) -> Option<&FilterModel> {
        match self {
            GridRequest::Infinite(r) => r.filter_model.as_ref(),
            GridRequest::ServerSide(r) => r.filter_model.as_ref(),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Converts grid requests into query descriptors.
#[derive(Clone, Copy, Debug)]
pub struct RequestNormalizer<'a> {
    config: &'a GridODataConfig,
}

impl<'a> RequestNormalizer<'a> {
    #[must_use]
    pub fn new(config: &'a GridODataConfig) -> Self {
        Self { config }
    }

    /// # Errors
    /// Fails on filter types, operators or aggregations outside the
    /// supported tables.
    pub fn normalize(&self, request: &GridRequest) -> Result<QueryDescriptor, Error> {
        let mut descriptor = QueryDescriptor::new();
        if let Some(model) = request.filter_model() {
            descriptor.filters = self.filters(model)?;
        }
        descriptor.sort = request
            .sort_model()
            .iter()
            .map(|s| SortKey::new(s.col_id.clone(), s.sort))
            .collect();

        match request {
            GridRequest::Infinite(r) => {
                descriptor.page = Some(PageWindow::from_rows(r.start_row.unwrap_or(0), r.end_row));
            }
            GridRequest::ServerSide(r) => {
                for key in &mut descriptor.sort {
                    if let Some(field) = resolve_col_id(r, &key.column) {
                        key.column = field.to_owned();
                    }
                }
                descriptor.group = GroupSpec::new(r.row_group_cols.iter().map(ColumnVo::column))
                    .with_keys(r.group_keys.clone());
                descriptor.pivot = PivotSpec {
                    pivot_mode: r.pivot_mode,
                    columns: r
                        .pivot_cols
                        .iter()
                        .map(|c| c.column().to_owned())
                        .collect(),
                    values: value_columns(&r.value_cols)?,
                };
                if !r.pivot_mode {
                    descriptor.page =
                        Some(PageWindow::from_rows(r.start_row.unwrap_or(0), r.end_row));
                }
            }
        }

        descriptor.count = self.config.request_count && !descriptor.is_grouped();
        Ok(descriptor)
    }

    fn filters(&self, model: &FilterModel) -> Result<Vec<FilterDescriptor>, Error> {
        let mut filters = Vec::with_capacity(model.len());
        for (column, entry) in model {
            let kind = filter_kind(column, entry, None)?;
            let predicate = predicate(column, kind, entry)?;
            filters.push(
                FilterDescriptor::new(column.clone(), kind, predicate)
                    .case_sensitive(self.config.is_case_sensitive(column)),
            );
        }
        Ok(filters)
    }
}

/// Data field behind a sort `colId`, looked up in the request's column metadata.
fn resolve_col_id<'r>(request: &'r ServerSideRowsRequest, col_id: &str) -> Option<&'r str> {
    request
        .row_group_cols
        .iter()
        .chain(&request.value_cols)
        .chain(&request.pivot_cols)
        .find(|c| c.id == col_id)
        .map(ColumnVo::column)
}

fn value_columns(cols: &[ColumnVo]) -> Result<Vec<ValueColumn>, Error> {
    cols.iter()
        .map(|c| {
            let name = c.agg_func.as_deref().unwrap_or("sum");
            AggregationKind::from_grid_name(name)
                .map(|agg| ValueColumn::new(c.column(), agg))
                .ok_or_else(|| Error::UnsupportedAggregation {
                    column: c.column().to_owned(),
                    aggregation: name.to_owned(),
                })
        })
        .collect()
}

fn filter_kind(
    column: &str,
    entry: &ColumnFilterModel,
    inherited: Option<FilterKind>,
) -> Result<FilterKind, Error> {
    match entry.filter_type.as_deref() {
        Some(name) => FilterKind::from_grid_name(name).ok_or_else(|| Error::UnsupportedOperator {
            column: column.to_owned(),
            operator: name.to_owned(),
        }),
        None if entry.values.is_some() => Ok(FilterKind::Set),
        None => Ok(inherited.unwrap_or(FilterKind::Text)),
    }
}

fn predicate(
    column: &str,
    kind: FilterKind,
    entry: &ColumnFilterModel,
) -> Result<FilterPredicate, Error> {
    if let Some(join_name) = entry.operator.as_deref() {
        let join = JoinOperator::from_grid_name(join_name).ok_or_else(|| {
            Error::UnsupportedOperator {
                column: column.to_owned(),
                operator: join_name.to_owned(),
            }
        })?;
        let parts: Vec<&ColumnFilterModel> = if entry.conditions.is_empty() {
            [&entry.condition1, &entry.condition2]
                .into_iter()
                .filter_map(Option::as_deref)
                .collect()
        } else {
            entry.conditions.iter().collect()
        };
        let conditions = parts
            .into_iter()
            .map(|c| {
                let sub_kind = filter_kind(column, c, Some(kind))?;
                predicate(column, sub_kind, c)
            })
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(FilterPredicate::Combined { join, conditions });
    }

    let operator = operator_for(column, kind, entry)?;
    let operands = match (kind, operator) {
        (_, OperatorKind::Blank | OperatorKind::NotBlank) => Vec::new(),
        (FilterKind::Set, _) => entry.values.clone().unwrap_or_default(),
        (FilterKind::Date, _) => [&entry.date_from, &entry.date_to]
            .into_iter()
            .flatten()
            .cloned()
            .collect(),
        (_, OperatorKind::InRange) => [&entry.filter, &entry.filter_to]
            .into_iter()
            .flatten()
            .cloned()
            .collect(),
        _ => entry.filter.iter().cloned().collect(),
    };
    Ok(FilterPredicate::condition(operator, operands))
}

fn operator_for(
    column: &str,
    kind: FilterKind,
    entry: &ColumnFilterModel,
) -> Result<OperatorKind, Error> {
    let default = match kind {
        FilterKind::Set => "in",
        FilterKind::Text | FilterKind::Number | FilterKind::Date => "equals",
    };
    let name = entry.condition_type.as_deref().unwrap_or(default);
    let unsupported = || Error::UnsupportedOperator {
        column: column.to_owned(),
        operator: name.to_owned(),
    };
    let operator = OperatorKind::from_grid_name(name).ok_or_else(unsupported)?;

    let allowed = match kind {
        FilterKind::Text => matches!(
            operator,
            OperatorKind::Equals
                | OperatorKind::NotEqual
                | OperatorKind::Contains
                | OperatorKind::NotContains
                | OperatorKind::StartsWith
                | OperatorKind::EndsWith
                | OperatorKind::Blank
                | OperatorKind::NotBlank
        ),
        FilterKind::Number | FilterKind::Date => matches!(
            operator,
            OperatorKind::Equals
                | OperatorKind::NotEqual
                | OperatorKind::LessThan
                | OperatorKind::LessThanOrEqual
                | OperatorKind::GreaterThan
                | OperatorKind::GreaterThanOrEqual
                | OperatorKind::InRange
                | OperatorKind::Blank
                | OperatorKind::NotBlank
        ),
        FilterKind::Set => matches!(operator, OperatorKind::In | OperatorKind::NotIn),
    };
    if allowed {
        Ok(operator)
    } else {
        Err(unsupported())
    }
}
