//! Filter predicates, global search and value ordering used by the client-side row model.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

/// Predicate kinds a column filter can use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterFn {
    /// Case-insensitive substring match.
    #[default]
    IncludesString,
    /// Case-sensitive substring match.
    IncludesStringSensitive,
    /// Case-insensitive full-string match.
    EqualsString,
    /// Structural equality of the JSON values (numbers compare numerically).
    Equals,
    /// Filter value is an array; the cell (or any element of an array cell) must equal one of it.
    ArrIncludesSome,
    /// Filter value is `[min, max]`, either side may be `null`.
    InNumberRange,
}

/// Renders a cell value the way it is searched and displayed by default.
pub fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Returns `true` when a filter value is "empty" and therefore should not filter anything.
pub fn is_empty_filter(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty() || items.iter().all(Value::is_null),
        _ => false,
    }
}

impl FilterFn {
    pub fn matches(self, cell: Option<&Value>, filter: &Value) -> bool {
        if is_empty_filter(filter) {
            return true;
        }
        match self {
            FilterFn::IncludesString => {
                let needle = stringify(Some(filter)).to_lowercase();
                stringify(cell).to_lowercase().contains(&needle)
            }
            FilterFn::IncludesStringSensitive => {
                let needle = stringify(Some(filter));
                stringify(cell).contains(&needle)
            }
            FilterFn::EqualsString => {
                stringify(cell).to_lowercase() == stringify(Some(filter)).to_lowercase()
            }
            FilterFn::Equals => cell.is_some_and(|c| values_equal(c, filter)),
            FilterFn::ArrIncludesSome => {
                let wanted: &[Value] = match filter {
                    Value::Array(items) => items,
                    other => std::slice::from_ref(other),
                };
                match cell {
                    Some(Value::Array(items)) => items
                        .iter()
                        .any(|c| wanted.iter().any(|w| values_equal(c, w))),
                    Some(c) => wanted.iter().any(|w| values_equal(c, w)),
                    None => false,
                }
            }
            FilterFn::InNumberRange => {
                let Some(n) = cell.and_then(as_number) else {
                    return false;
                };
                let (min, max) = match filter {
                    Value::Array(items) => (
                        items.first().and_then(as_number),
                        items.get(1).and_then(as_number),
                    ),
                    other => (as_number(other), None),
                };
                min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m)
            }
        }
    }
}

/// Case-insensitive substring match against any of the given cell values.
pub fn global_matches<'a>(cells: impl IntoIterator<Item = Option<&'a Value>>, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let needle = query.to_lowercase();
    cells
        .into_iter()
        .any(|c| stringify(c).to_lowercase().contains(&needle))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Total order used for sorting cells.
///
/// Missing/null values sort after everything else (in both directions the caller reverses only
/// the present values). Numbers compare numerically, strings case-insensitively with a
/// case-sensitive tiebreak, booleans `false < true`; mixed kinds fall back to their string form.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare_present(a, b),
    }
}

fn compare_present(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.total_cmp(&y)
        }
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => {
            let x = stringify(Some(a));
            let y = stringify(Some(b));
            x.to_lowercase()
                .cmp(&y.to_lowercase())
                .then_with(|| x.cmp(&y))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sensitive_and_insensitive_includes() {
        let cell = json!("Doe");
        assert!(!FilterFn::IncludesStringSensitive.matches(Some(&cell), &json!("doe")));
        assert!(FilterFn::IncludesStringSensitive.matches(Some(&cell), &json!("Doe")));
        assert!(FilterFn::IncludesString.matches(Some(&cell), &json!("doe")));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(FilterFn::Equals.matches(None, &json!("")));
        assert!(FilterFn::InNumberRange.matches(None, &json!([null, null])));
    }

    #[test]
    fn number_range_is_inclusive() {
        let f = FilterFn::InNumberRange;
        assert!(f.matches(Some(&json!(5)), &json!([5, 10])));
        assert!(f.matches(Some(&json!(10)), &json!([null, 10])));
        assert!(!f.matches(Some(&json!(11)), &json!([null, 10])));
    }

    #[test]
    fn arr_includes_some_accepts_array_cells() {
        let f = FilterFn::ArrIncludesSome;
        assert!(f.matches(Some(&json!(["a", "b"])), &json!(["b"])));
        assert!(f.matches(Some(&json!("a")), &json!(["a", "z"])));
        assert!(!f.matches(Some(&json!("c")), &json!(["a", "z"])));
    }

    #[test]
    fn nulls_sort_last() {
        let mut v = vec![Some(json!(3)), None, Some(json!(1))];
        v.sort_by(|a, b| compare_values(a.as_ref(), b.as_ref()));
        assert_eq!(v, vec![Some(json!(1)), Some(json!(3)), None]);
    }
}
