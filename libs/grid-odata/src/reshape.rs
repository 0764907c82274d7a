//! Result Reshaper: raw `OData` records back into grid rows.
//!
//! Three paths, chosen from the descriptor and the records themselves:
//!
//! - **pivot**: one row per active group key with one cell per observed
//!   pivot-value combination and value column, plus the synthesized
//!   secondary column tree;
//! - **grouped**: records carrying the group count field are backend
//!   buckets and map 1:1 to group rows; otherwise leaf rows are grouped
//!   client-side down to the last pending group column and aggregated;
//! - **flat**: records are passed through untouched. The page window is a
//!   server-side contract and is never applied here.

use std::collections::HashMap;

use serde_json::{Map, Number, Value};

use crate::Error;
use crate::columns::{ColumnDef, build_secondary_columns, pivot_field_id};
use crate::config::GridODataConfig;
use crate::descriptor::{QueryDescriptor, ValueColumn};
use crate::literal::display_text;
use crate::operators::AggregationKind;

/// Largest integer an `f64` holds exactly (2^53 - 1).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Decoded transport payload.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawResultSet {
    pub records: Vec<Value>,
    /// Total count reported by the backend, if any.
    pub count: Option<u64>,
}

impl RawResultSet {
    #[must_use]
    pub fn new(records: Vec<Value>, count: Option<u64>) -> Self {
        Self { records, count }
    }

    /// Accept either a bare record array or an `OData` envelope object.
    ///
    /// # Errors
    /// `Error::InvalidResponse` when no record array can be found.
    pub fn from_response(response: Value, config: &GridODataConfig) -> Result<Self, Error> {
        match response {
            Value::Array(records) => Ok(Self::new(records, None)),
            Value::Object(mut obj) => {
                let count = obj.get(&config.count_field_name).and_then(coerce_u64);
                match obj.remove(&config.result_field_name) {
                    Some(Value::Array(records)) => Ok(Self::new(records, count)),
                    Some(_) => Err(Error::InvalidResponse(format!(
                        "'{}' is not an array",
                        config.result_field_name
                    ))),
                    None => Err(Error::InvalidResponse(format!(
                        "object has no '{}' field",
                        config.result_field_name
                    ))),
                }
            }
            other => Err(Error::InvalidResponse(format!(
                "expected an array or an object, got {other}"
            ))),
        }
    }
}

/// Children of a group row.
#[derive(Clone, Debug, PartialEq)]
pub enum GroupChildren {
    /// Fetched by a follow-up request when the group is expanded.
    Lazy,
    Materialized(Vec<GridRow>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct GroupRow {
    /// Group column the key belongs to.
    pub field: String,
    pub key: Value,
    pub child_count: u64,
    /// Aggregate values (or pivot cells) keyed by output field.
    pub aggregates: Map<String, Value>,
    pub children: GroupChildren,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GridRow {
    Leaf(Value),
    Group(GroupRow),
}

impl GridRow {
    /// Flatten into the record shape grids consume: the group key under its
    /// field, the child count under `count_field`, then the aggregates.
    #[must_use]
    pub fn to_record(&self, count_field: &str) -> Value {
        match self {
            GridRow::Leaf(record) => record.clone(),
            GridRow::Group(group) => {
                let mut out = Map::new();
                set_value(&mut out, &group.field, group.key.clone());
                out.insert(count_field.to_owned(), Value::from(group.child_count));
                for (name, value) in &group.aggregates {
                    out.insert(name.clone(), value.clone());
                }
                Value::Object(out)
            }
        }
    }
}

/// Reshaped output for one request.
#[derive(Clone, Debug, PartialEq)]
pub struct Reshaped {
    pub rows: Vec<GridRow>,
    pub total_count: u64,
    /// Secondary column tree, present for pivot requests only.
    pub secondary_columns: Option<Vec<ColumnDef>>,
}

impl Reshaped {
    #[must_use]
    pub fn records(&self, count_field: &str) -> Vec<Value> {
        self.rows.iter().map(|r| r.to_record(count_field)).collect()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ResultReshaper<'a> {
    config: &'a GridODataConfig,
}

impl<'a> ResultReshaper<'a> {
    #[must_use]
    pub fn new(config: &'a GridODataConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn reshape(&self, raw: RawResultSet, descriptor: &QueryDescriptor) -> Reshaped {
        let RawResultSet { records, count } = raw;
        let values = &descriptor.pivot.values;

        let (path, rows, secondary_columns) = if descriptor.pivot.is_active() {
            let (rows, columns) = self.pivot(&records, descriptor);
            ("pivot", rows, Some(columns))
        } else if let Some(active) = descriptor.group.active_column() {
            if self.is_bucketed(&records) {
                ("buckets", self.buckets(&records, active, values), None)
            } else {
                let refs: Vec<&Value> = records.iter().collect();
                let rows = group_rows(&refs, descriptor.group.pending_columns(), values);
                ("client_grouping", rows, None)
            }
        } else {
            ("flat", records.into_iter().map(GridRow::Leaf).collect(), None)
        };

        let total_count = count.unwrap_or_else(|| len_u64(rows.len()));
        tracing::debug!(
            target: "grid_odata::reshape",
            path,
            rows = rows.len(),
            total_count,
            "reshaped result set"
        );
        Reshaped {
            rows,
            total_count,
            secondary_columns,
        }
    }

    fn is_bucketed(&self, records: &[Value]) -> bool {
        let field = &self.config.group_count_field_name;
        records.iter().any(|r| r.get(field).is_some())
    }

    fn bucket_count(&self, record: &Value) -> u64 {
        record
            .get(&self.config.group_count_field_name)
            .and_then(coerce_u64)
            .unwrap_or(0)
    }

    fn buckets(&self, records: &[Value], active: &str, values: &[ValueColumn]) -> Vec<GridRow> {
        records
            .iter()
            .map(|record| {
                GridRow::Group(GroupRow {
                    field: active.to_owned(),
                    key: get_value(record, active).cloned().unwrap_or(Value::Null),
                    child_count: self.bucket_count(record),
                    aggregates: bucket_values(&[record], values),
                    children: GroupChildren::Lazy,
                })
            })
            .collect()
    }

    fn pivot(
        &self,
        records: &[Value],
        descriptor: &QueryDescriptor,
    ) -> (Vec<GridRow>, Vec<ColumnDef>) {
        let values = &descriptor.pivot.values;
        let bucketed = self.is_bucketed(records);
        let active = descriptor.group.active_column();

        let partitions = match active {
            Some(column) => group_by(records, column),
            None => vec![(Value::Null, records.iter().collect())],
        };

        let mut combos: Vec<Vec<String>> = Vec::new();
        let mut rows = Vec::with_capacity(partitions.len());
        for (key, members) in partitions {
            let mut cells = Map::new();
            for (combo, cell_records) in partition_by_combo(&members, &descriptor.pivot.columns) {
                let aggregates = if bucketed {
                    bucket_values(&cell_records, values)
                } else {
                    aggregate_list(&cell_records, values)
                };
                for (alias, value) in aggregates {
                    cells.insert(pivot_field_id(&combo, &alias), value);
                }
                if !combos.contains(&combo) {
                    combos.push(combo);
                }
            }

            let child_count: u64 = if bucketed {
                members.iter().map(|r| self.bucket_count(r)).sum()
            } else {
                len_u64(members.len())
            };
            rows.push(match active {
                Some(column) => GridRow::Group(GroupRow {
                    field: column.to_owned(),
                    key,
                    child_count,
                    aggregates: cells,
                    children: GroupChildren::Lazy,
                }),
                None => GridRow::Leaf(Value::Object(cells)),
            });
        }

        (rows, build_secondary_columns(&combos, values))
    }
}

/// Recursive client-side grouping down to the last pending column.
fn group_rows(records: &[&Value], columns: &[String], values: &[ValueColumn]) -> Vec<GridRow> {
    let Some((column, rest)) = columns.split_first() else {
        return records.iter().map(|r| GridRow::Leaf((*r).clone())).collect();
    };
    group_by(records.iter().copied(), column)
        .into_iter()
        .map(|(key, members)| {
            GridRow::Group(GroupRow {
                field: column.clone(),
                key,
                child_count: len_u64(members.len()),
                aggregates: aggregate_list(&members, values),
                children: GroupChildren::Materialized(group_rows(&members, rest, values)),
            })
        })
        .collect()
}

fn partition_by_combo<'v>(
    records: &[&'v Value],
    pivot_columns: &[String],
) -> Vec<(Vec<String>, Vec<&'v Value>)> {
    let mut partitions: Vec<(Vec<String>, Vec<&'v Value>)> = Vec::new();
    for &record in records {
        let combo: Vec<String> = pivot_columns
            .iter()
            .map(|c| get_value(record, c).map(display_text).unwrap_or_default())
            .collect();
        match partitions.iter_mut().find(|(c, _)| *c == combo) {
            Some((_, members)) => members.push(record),
            None => partitions.push((combo, vec![record])),
        }
    }
    partitions
}

/// Values already aggregated by the backend, read by alias. Later records win.
fn bucket_values(records: &[&Value], values: &[ValueColumn]) -> Map<String, Value> {
    let mut out = Map::new();
    for record in records {
        for value in values {
            let cell = get_value(record, value.alias()).cloned().unwrap_or(Value::Null);
            out.insert(value.alias().to_owned(), cell);
        }
    }
    out
}

/// Read a field by dotted path (`a.b.c`). A literal key containing dots wins
/// over path traversal.
#[must_use]
pub fn get_value<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    if let Some(direct) = record.get(path) {
        return Some(direct);
    }
    path.split('.').try_fold(record, |current, segment| current.get(segment))
}

/// Write a field by dotted path, creating intermediate objects.
fn set_value(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_owned(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(inner) = entry {
                set_value(inner, rest, value);
            }
        }
    }
}

/// Partition records by the value at `field`, keeping first-seen order.
#[must_use]
pub fn group_by<'v, I>(records: I, field: &str) -> Vec<(Value, Vec<&'v Value>)>
where
    I: IntoIterator<Item = &'v Value>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(Value, Vec<&'v Value>)> = Vec::new();
    for record in records {
        let key = get_value(record, field).cloned().unwrap_or(Value::Null);
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(record);
    }
    groups
}

/// Distinct values of `field` in first-seen order.
#[must_use]
pub fn distinct_values(records: &[Value], field: &str) -> Vec<Value> {
    group_by(records, field)
        .into_iter()
        .map(|(key, _)| key)
        .collect()
}

/// Compute the requested aggregates over a partition.
///
/// Numbers and numeric strings take part in sum/min/max/avg; anything else
/// is skipped. `count` counts every record. Sum of nothing is 0, min/max/avg
/// of nothing is null.
#[must_use]
pub fn aggregate_list(records: &[&Value], values: &[ValueColumn]) -> Map<String, Value> {
    let mut out = Map::new();
    for value in values {
        let numbers: Vec<f64> = records
            .iter()
            .filter_map(|r| get_value(r, &value.column))
            .filter_map(coerce_f64)
            .collect();
        let result = match value.aggregation {
            AggregationKind::Count => Value::from(len_u64(records.len())),
            AggregationKind::Sum => number_value(numbers.iter().sum()),
            AggregationKind::Min => numbers
                .iter()
                .copied()
                .reduce(f64::min)
                .map_or(Value::Null, number_value),
            AggregationKind::Max => numbers
                .iter()
                .copied()
                .reduce(f64::max)
                .map_or(Value::Null, number_value),
            AggregationKind::Avg => {
                if numbers.is_empty() {
                    Value::Null
                } else {
                    #[allow(clippy::cast_precision_loss)]
                    let n = numbers.len() as f64;
                    number_value(numbers.iter().sum::<f64>() / n)
                }
            }
        };
        out.insert(value.alias().to_owned(), result);
    }
    out
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

fn coerce_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Integral results within the exact range are emitted as integers.
fn number_value(x: f64) -> Value {
    if x.fract().abs() < f64::EPSILON && x.abs() <= MAX_EXACT_INTEGER {
        #[allow(clippy::cast_possible_truncation)]
        let int = x as i64;
        return Value::from(int);
    }
    Number::from_f64(x).map_or(Value::Null, Value::Number)
}

fn len_u64(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::descriptor::{GroupSpec, PivotSpec};
    use serde_json::json;

    fn config() -> GridODataConfig {
        GridODataConfig::default()
    }

    fn sum_amount() -> Vec<ValueColumn> {
        vec![ValueColumn::new("amount", AggregationKind::Sum)]
    }

    #[test]
    fn test_from_response_envelope_and_array() {
        let raw = RawResultSet::from_response(
            json!({ "@odata.count": 42, "value": [{ "id": 1 }] }),
            &config(),
        )
        .unwrap();
        assert_eq!(raw.count, Some(42));
        assert_eq!(raw.records.len(), 1);

        let raw = RawResultSet::from_response(json!([{ "id": 1 }, { "id": 2 }]), &config()).unwrap();
        assert_eq!(raw.count, None);
        assert_eq!(raw.records.len(), 2);
    }

    #[test]
    fn test_from_response_rejects_other_shapes() {
        let err = RawResultSet::from_response(json!({ "items": [] }), &config()).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
        let err = RawResultSet::from_response(json!("nope"), &config()).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_get_value_nested_path() {
        let record = json!({ "customer": { "address": { "city": "Paris" } }, "a.b": 1 });
        assert_eq!(get_value(&record, "customer.address.city"), Some(&json!("Paris")));
        assert_eq!(get_value(&record, "a.b"), Some(&json!(1)));
        assert_eq!(get_value(&record, "customer.zip"), None);
    }

    #[test]
    fn test_group_by_keeps_first_seen_order() {
        let records = vec![
            json!({ "c": "b" }),
            json!({ "c": "a" }),
            json!({ "c": "b" }),
            json!({}),
        ];
        let groups = group_by(&records, "c");
        let keys: Vec<&Value> = groups.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec![&json!("b"), &json!("a"), &Value::Null]);
        assert_eq!(groups[0].1.len(), 2);
    }

    #[test]
    fn test_aggregate_list_coerces_and_skips() {
        let records = [
            json!({ "amount": 10 }),
            json!({ "amount": "5.5" }),
            json!({ "amount": "n/a" }),
            json!({}),
        ];
        let refs: Vec<&Value> = records.iter().collect();
        let values = vec![
            ValueColumn::new("amount", AggregationKind::Sum).with_alias("s"),
            ValueColumn::new("amount", AggregationKind::Min).with_alias("lo"),
            ValueColumn::new("amount", AggregationKind::Max).with_alias("hi"),
            ValueColumn::new("amount", AggregationKind::Avg).with_alias("mean"),
            ValueColumn::new("amount", AggregationKind::Count).with_alias("n"),
        ];
        let out = aggregate_list(&refs, &values);
        assert_eq!(out["s"], json!(15.5));
        assert_eq!(out["lo"], json!(5.5));
        assert_eq!(out["hi"], json!(10));
        assert_eq!(out["mean"], json!(7.75));
        assert_eq!(out["n"], json!(4));
    }

    #[test]
    fn test_aggregate_list_empty_partition() {
        let values = vec![
            ValueColumn::new("amount", AggregationKind::Sum),
            ValueColumn::new("amount", AggregationKind::Max).with_alias("hi"),
        ];
        let out = aggregate_list(&[], &values);
        assert_eq!(out["amount"], json!(0));
        assert_eq!(out["hi"], Value::Null);
    }

    #[test]
    fn test_flat_rows_pass_through_untruncated() {
        let records = vec![json!({ "amount": 150 }), json!({ "amount": 120 }), json!({ "amount": 110 })];
        let d = QueryDescriptor::new().with_page(crate::descriptor::PageWindow::new(0, Some(2)));
        let out = ResultReshaper::new(&config()).reshape(RawResultSet::new(records.clone(), None), &d);
        assert_eq!(out.total_count, 3);
        assert_eq!(out.records("childCount"), records);
        assert!(out.secondary_columns.is_none());
    }

    #[test]
    fn test_backend_buckets_map_one_to_one() {
        let records = vec![
            json!({ "country": "France", "childCount": 12, "amount": 300 }),
            json!({ "country": "Spain", "childCount": 3, "amount": 40 }),
        ];
        let d = QueryDescriptor::new()
            .with_group(GroupSpec::new(["country", "city"]))
            .with_values(sum_amount());
        let out = ResultReshaper::new(&config()).reshape(RawResultSet::new(records, None), &d);
        assert_eq!(out.total_count, 2);
        let GridRow::Group(first) = &out.rows[0] else {
            panic!("expected group row");
        };
        assert_eq!(first.key, json!("France"));
        assert_eq!(first.child_count, 12);
        assert_eq!(first.aggregates["amount"], json!(300));
        assert_eq!(first.children, GroupChildren::Lazy);
        assert_eq!(
            out.rows[1].to_record("childCount"),
            json!({ "country": "Spain", "childCount": 3, "amount": 40 })
        );
    }

    #[test]
    fn test_client_side_grouping_nests_pending_levels() {
        let records = vec![
            json!({ "country": "France", "city": "Paris", "amount": 1 }),
            json!({ "country": "France", "city": "Lyon", "amount": 2 }),
            json!({ "country": "Spain", "city": "Madrid", "amount": 4 }),
            json!({ "country": "France", "city": "Paris", "amount": 8 }),
        ];
        let d = QueryDescriptor::new()
            .with_group(GroupSpec::new(["country", "city"]))
            .with_values(sum_amount());
        let out = ResultReshaper::new(&config()).reshape(RawResultSet::new(records, None), &d);

        assert_eq!(out.rows.len(), 2);
        let GridRow::Group(france) = &out.rows[0] else {
            panic!("expected group row");
        };
        assert_eq!(france.child_count, 3);
        assert_eq!(france.aggregates["amount"], json!(11));
        let GroupChildren::Materialized(cities) = &france.children else {
            panic!("expected materialized children");
        };
        let GridRow::Group(paris) = &cities[0] else {
            panic!("expected nested group");
        };
        assert_eq!(paris.key, json!("Paris"));
        assert_eq!(paris.child_count, 2);
        let GroupChildren::Materialized(leaves) = &paris.children else {
            panic!("expected leaf rows");
        };
        assert!(matches!(leaves[0], GridRow::Leaf(_)));
    }

    #[test]
    fn test_pivot_cells_and_secondary_columns() {
        let records = vec![
            json!({ "country": "France", "year": 2020, "amount": 10, "childCount": 2 }),
            json!({ "country": "France", "year": 2021, "amount": 20, "childCount": 1 }),
            json!({ "country": "Spain", "year": 2020, "amount": 5, "childCount": 4 }),
        ];
        let d = QueryDescriptor::new()
            .with_group(GroupSpec::new(["country"]))
            .with_pivot(PivotSpec {
                pivot_mode: true,
                columns: vec!["year".to_owned()],
                values: sum_amount(),
            });
        let out = ResultReshaper::new(&config()).reshape(RawResultSet::new(records, None), &d);

        assert_eq!(
            out.rows[0].to_record("childCount"),
            json!({ "country": "France", "childCount": 3, "2020_amount": 10, "2021_amount": 20 })
        );
        assert_eq!(
            out.rows[1].to_record("childCount"),
            json!({ "country": "Spain", "childCount": 4, "2020_amount": 5 })
        );
        let columns = out.secondary_columns.unwrap();
        let fields: Vec<&str> = crate::columns::leaves(&columns)
            .iter()
            .map(|l| l.field.as_str())
            .collect();
        assert_eq!(fields, vec!["2020_amount", "2021_amount"]);
    }

    #[test]
    fn test_pivot_without_row_groups_aggregates_leaf_rows() {
        let records = vec![
            json!({ "year": "2020", "amount": 1 }),
            json!({ "year": "2020", "amount": 2 }),
            json!({ "year": "2021", "amount": 4 }),
        ];
        let d = QueryDescriptor::new().with_pivot(PivotSpec {
            pivot_mode: true,
            columns: vec!["year".to_owned()],
            values: sum_amount(),
        });
        let out = ResultReshaper::new(&config()).reshape(RawResultSet::new(records, None), &d);
        assert_eq!(out.rows, vec![GridRow::Leaf(json!({ "2020_amount": 3, "2021_amount": 4 }))]);
    }

    #[test]
    fn test_group_record_writes_nested_field() {
        let row = GridRow::Group(GroupRow {
            field: "address.city".to_owned(),
            key: json!("Paris"),
            child_count: 2,
            aggregates: Map::new(),
            children: GroupChildren::Lazy,
        });
        assert_eq!(
            row.to_record("childCount"),
            json!({ "address": { "city": "Paris" }, "childCount": 2 })
        );
    }

    #[test]
    fn test_distinct_values() {
        let records = vec![json!({ "s": "open" }), json!({ "s": "closed" }), json!({ "s": "open" })];
        assert_eq!(distinct_values(&records, "s"), vec![json!("open"), json!("closed")]);
    }
}
