//! Operator library: pure functions producing `OData` expression fragments.
//!
//! Every function takes an already-wrapped column reference (see
//! [`crate::builder::wrap_column_name`]) and already-encoded literal operands
//! (see [`crate::literal`]). Nothing here performs I/O or fails.
//!
//! String operators take a `case_sensitive` flag. When it is false, both the
//! column and the literal are wrapped in `tolower(...)`; the wrapping is always
//! applied to both sides together.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

#[must_use]
pub fn equals(col: &str, value: &str) -> String {
    format!("{col} eq {value}")
}

#[must_use]
pub fn not_equal(col: &str, value: &str) -> String {
    format!("{col} ne {value}")
}

#[must_use]
pub fn less_than(col: &str, value: &str) -> String {
    format!("{col} lt {value}")
}

#[must_use]
pub fn less_than_or_equal(col: &str, value: &str) -> String {
    format!("{col} le {value}")
}

#[must_use]
pub fn greater_than(col: &str, value: &str) -> String {
    format!("{col} gt {value}")
}

#[must_use]
pub fn greater_than_or_equal(col: &str, value: &str) -> String {
    format!("{col} ge {value}")
}

/// Inclusive range: `(col ge from and col le to)`
#[must_use]
pub fn in_range(col: &str, from: &str, to: &str) -> String {
    format!("({col} ge {from} and {col} le {to})")
}

/// `col eq null`
#[must_use]
pub fn blank(col: &str) -> String {
    format!("{col} eq null")
}

/// `col ne null`
#[must_use]
pub fn not_blank(col: &str) -> String {
    format!("{col} ne null")
}

/// Wrap a column in `tolower` unless the comparison is case-sensitive.
#[must_use]
pub fn if_tolower_col(col: &str, case_sensitive: bool) -> Cow<'_, str> {
    if case_sensitive {
        Cow::Borrowed(col)
    } else {
        Cow::Owned(format!("tolower({col})"))
    }
}

/// Wrap a literal in `tolower` unless the comparison is case-sensitive.
#[must_use]
pub fn if_tolower(value: &str, case_sensitive: bool) -> Cow<'_, str> {
    if_tolower_col(value, case_sensitive)
}

fn fold(col: &str, value: &str, case_sensitive: bool) -> (String, String) {
    (
        if_tolower_col(col, case_sensitive).into_owned(),
        if_tolower(value, case_sensitive).into_owned(),
    )
}

#[must_use]
pub fn equals_str(col: &str, value: &str, case_sensitive: bool) -> String {
    let (c, v) = fold(col, value, case_sensitive);
    equals(&c, &v)
}

#[must_use]
pub fn not_equal_str(col: &str, value: &str, case_sensitive: bool) -> String {
    let (c, v) = fold(col, value, case_sensitive);
    not_equal(&c, &v)
}

#[must_use]
pub fn contains(col: &str, value: &str, case_sensitive: bool) -> String {
    let (c, v) = fold(col, value, case_sensitive);
    format!("contains({c},{v})")
}

#[must_use]
pub fn not_contains(col: &str, value: &str, case_sensitive: bool) -> String {
    format!("not {}", contains(col, value, case_sensitive))
}

#[must_use]
pub fn starts_with(col: &str, value: &str, case_sensitive: bool) -> String {
    let (c, v) = fold(col, value, case_sensitive);
    format!("startswith({c},{v})")
}

#[must_use]
pub fn ends_with(col: &str, value: &str, case_sensitive: bool) -> String {
    let (c, v) = fold(col, value, case_sensitive);
    format!("endswith({c},{v})")
}

/// Native list form: `col in (v1,v2)`. An empty list matches nothing.
#[must_use]
pub fn in_list(col: &str, values: &[String]) -> String {
    if values.is_empty() {
        return "false".to_owned();
    }
    format!("{col} in ({})", values.join(","))
}

/// `not (col in (v1,v2))`. An empty list excludes nothing.
#[must_use]
pub fn not_in(col: &str, values: &[String]) -> String {
    if values.is_empty() {
        return "true".to_owned();
    }
    format!("not ({})", in_list(col, values))
}

/// Set membership for strings.
///
/// Case-sensitive sets use the native `in` list. Case-folded sets become an
/// OR-chain of folded equalities, since `in` only accepts plain literals.
#[must_use]
pub fn in_str(col: &str, values: &[String], case_sensitive: bool) -> String {
    if case_sensitive || values.is_empty() {
        return in_list(col, values);
    }
    let mut parts: Vec<String> = values
        .iter()
        .map(|v| equals_str(col, v, false))
        .collect();
    if parts.len() == 1 {
        return parts.swap_remove(0);
    }
    format!("({})", parts.join(" or "))
}

/// Date truncation for date-only comparisons: `date(col)`
#[must_use]
pub fn trunc(col: &str) -> String {
    format!("date({col})")
}

/// Aggregation methods understood by `$apply=aggregate(...)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    Sum,
    Min,
    Max,
    Avg,
    Count,
}

impl AggregationKind {
    /// Parse a grid `aggFunc` name.
    #[must_use]
    pub fn from_grid_name(name: &str) -> Option<Self> {
        match name {
            "sum" => Some(Self::Sum),
            "min" => Some(Self::Min),
            "max" => Some(Self::Max),
            "avg" => Some(Self::Avg),
            "count" => Some(Self::Count),
            _ => None,
        }
    }

    /// Grid-facing name (`avg`, not `average`).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sum => "sum",
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::Count => "count",
        }
    }

    /// Render the aggregate expression; alias defaults to the column.
    #[must_use]
    pub fn render(self, col: &str, alias: Option<&str>) -> String {
        let alias = alias.unwrap_or(col);
        match self {
            Self::Sum => format!("{col} with sum as {alias}"),
            Self::Min => format!("{col} with min as {alias}"),
            Self::Max => format!("{col} with max as {alias}"),
            Self::Avg => format!("{col} with average as {alias}"),
            Self::Count => format!("$count as {alias}"),
        }
    }
}

impl std::fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[must_use]
pub fn sum(col: &str, alias: Option<&str>) -> String {
    AggregationKind::Sum.render(col, alias)
}

#[must_use]
pub fn min(col: &str, alias: Option<&str>) -> String {
    AggregationKind::Min.render(col, alias)
}

#[must_use]
pub fn max(col: &str, alias: Option<&str>) -> String {
    AggregationKind::Max.render(col, alias)
}

#[must_use]
pub fn avg(col: &str, alias: Option<&str>) -> String {
    AggregationKind::Avg.render(col, alias)
}

#[must_use]
pub fn count(col: &str, alias: Option<&str>) -> String {
    AggregationKind::Count.render(col, alias)
}
