//! Secondary (pivot) column definitions.
//!
//! Pivoting synthesizes one leaf column per observed pivot-value
//! combination and value column, nested under one group per pivot level.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::descriptor::ValueColumn;

/// Node of the column-definition tree handed to the grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnDef {
    Group(ColumnGroupDef),
    Column(ColumnLeafDef),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnGroupDef {
    pub header_name: String,
    pub group_id: String,
    pub children: Vec<ColumnDef>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnLeafDef {
    /// `aggFunc(column)`
    pub header_name: String,
    pub field: String,
    pub col_id: String,
    pub pivot_keys: Vec<String>,
    pub agg_func: String,
    /// Extra grid column properties set by hooks.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Field id of a pivot cell: pivot values and the value alias joined by `_`.
#[must_use]
pub fn pivot_field_id(pivot_keys: &[String], alias: &str) -> String {
    let mut parts: Vec<&str> = pivot_keys.iter().map(String::as_str).collect();
    parts.push(alias);
    parts.join("_")
}

/// Build the secondary column tree from observed pivot-key combinations.
///
/// Groups and leaves keep the order in which combinations were first seen.
#[must_use]
pub fn build_secondary_columns(combos: &[Vec<String>], values: &[ValueColumn]) -> Vec<ColumnDef> {
    let combos: Vec<&[String]> = combos.iter().map(Vec::as_slice).collect();
    build_level(&combos, 0, values)
}

fn build_level(combos: &[&[String]], depth: usize, values: &[ValueColumn]) -> Vec<ColumnDef> {
    let mut defs: Vec<ColumnDef> = Vec::new();
    // (header, group id, combos below it)
    let mut buckets: Vec<(&str, String, Vec<&[String]>)> = Vec::new();

    for &combo in combos {
        let Some(key) = combo.get(depth) else {
            push_leaves(&mut defs, combo, values);
            continue;
        };
        if let Some((_, _, members)) = buckets.iter_mut().find(|(k, _, _)| *k == key.as_str()) {
            members.push(combo);
        } else {
            let group_id = combo.iter().take(depth + 1).cloned().collect::<Vec<_>>().join("_");
            buckets.push((key.as_str(), group_id, vec![combo]));
        }
    }

    for (header, group_id, members) in buckets {
        defs.push(ColumnDef::Group(ColumnGroupDef {
            header_name: header.to_owned(),
            group_id,
            children: build_level(&members, depth + 1, values),
        }));
    }
    defs
}

fn push_leaves(defs: &mut Vec<ColumnDef>, combo: &[String], values: &[ValueColumn]) {
    for value in values {
        let field = pivot_field_id(combo, value.alias());
        let seen = defs
            .iter()
            .any(|c| matches!(c, ColumnDef::Column(l) if l.field == field));
        if seen {
            continue;
        }
        defs.push(ColumnDef::Column(ColumnLeafDef {
            header_name: format!("{}({})", value.aggregation, value.column),
            col_id: field.clone(),
            field,
            pivot_keys: combo.to_vec(),
            agg_func: value.aggregation.as_str().to_owned(),
            extra: Map::new(),
        }));
    }
}

/// All leaf columns, depth-first in tree order.
#[must_use]
pub fn leaves(defs: &[ColumnDef]) -> Vec<&ColumnLeafDef> {
    let mut out = Vec::new();
    let mut stack: Vec<&ColumnDef> = defs.iter().rev().collect();
    while let Some(def) = stack.pop() {
        match def {
            ColumnDef::Group(g) => stack.extend(g.children.iter().rev()),
            ColumnDef::Column(l) => out.push(l),
        }
    }
    out
}

/// Visit every leaf column mutably, depth-first in tree order.
pub fn for_each_leaf_mut<F>(defs: &mut [ColumnDef], mut f: F)
where
    F: FnMut(&mut ColumnLeafDef),
{
    let mut stack: Vec<&mut ColumnDef> = defs.iter_mut().rev().collect();
    while let Some(def) = stack.pop() {
        match def {
            ColumnDef::Group(g) => stack.extend(g.children.iter_mut().rev()),
            ColumnDef::Column(l) => f(l),
        }
    }
}
