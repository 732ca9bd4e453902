use super::error::PathError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::fmt;

pub const SEPARATOR: char = '.';

/// A dotted field path (`"address.city"`) compiled once into its segments.
///
/// Reads never fail: a missing segment (or a segment that runs into a scalar) yields `None`.
/// Writes create intermediate objects where the path is absent and report an error when they would
/// have to descend through a scalar.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<String>,
}

impl FieldPath {
    pub fn parse(raw: &str) -> Result<Self, PathError> {
        if raw.is_empty() {
            return Err(PathError::Empty);
        }
        let segments: Vec<String> = raw.split(SEPARATOR).map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            return Err(PathError::EmptySegment(raw.to_string()));
        }
        Ok(Self {
            raw: raw.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_nested(&self) -> bool {
        self.segments.len() > 1
    }

    pub fn get<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        let mut cur = value;
        for seg in &self.segments {
            cur = match cur {
                Value::Object(map) => map.get(seg)?,
                Value::Array(items) => items.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    pub fn set(&self, value: &mut Value, new: Value) -> Result<(), PathError> {
        let (last, parents) = self
            .segments
            .split_last()
            .ok_or(PathError::Empty)?;

        let mut cur = value;
        for seg in parents {
            if cur.is_null() {
                *cur = Value::Object(Map::new());
            }
            cur = match cur {
                Value::Object(map) => map
                    .entry(seg.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(items) => {
                    let idx = seg.parse::<usize>().map_err(|_| self.not_container(seg))?;
                    items.get_mut(idx).ok_or_else(|| self.not_container(seg))?
                }
                _ => return Err(self.not_container(seg)),
            };
        }

        if cur.is_null() {
            *cur = Value::Object(Map::new());
        }
        match cur {
            Value::Object(map) => {
                map.insert(last.clone(), new);
                Ok(())
            }
            Value::Array(items) => {
                let slot = last
                    .parse::<usize>()
                    .ok()
                    .and_then(|idx| items.get_mut(idx))
                    .ok_or_else(|| self.not_container(last))?;
                *slot = new;
                Ok(())
            }
            _ => Err(self.not_container(last)),
        }
    }

    fn not_container(&self, segment: &str) -> PathError {
        PathError::NotAContainer {
            path: self.raw.clone(),
            segment: segment.to_string(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<FieldPath> for String {
    fn from(value: FieldPath) -> Self {
        value.raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_nested_values_and_misses_quietly() {
        let row = json!({ "name": { "first": "Ada", "tags": ["x", "y"] } });
        let first = FieldPath::parse("name.first").unwrap();
        assert_eq!(first.get(&row), Some(&json!("Ada")));

        let tag = FieldPath::parse("name.tags.1").unwrap();
        assert_eq!(tag.get(&row), Some(&json!("y")));

        let missing = FieldPath::parse("name.middle.initial").unwrap();
        assert_eq!(missing.get(&row), None);

        let through_scalar = FieldPath::parse("name.first.len").unwrap();
        assert_eq!(through_scalar.get(&row), None);
    }

    #[test]
    fn writes_create_intermediate_objects() {
        let mut row = json!({ "id": 1 });
        let path = FieldPath::parse("address.city").unwrap();
        path.set(&mut row, json!("Oslo")).unwrap();
        assert_eq!(row, json!({ "id": 1, "address": { "city": "Oslo" } }));
    }

    #[test]
    fn write_through_scalar_is_an_error() {
        let mut row = json!({ "id": 1 });
        let path = FieldPath::parse("id.value").unwrap();
        assert!(matches!(
            path.set(&mut row, json!(2)),
            Err(PathError::NotAContainer { .. })
        ));
        assert_eq!(row, json!({ "id": 1 }));
    }

    #[test]
    fn rejects_empty_segments() {
        assert_eq!(FieldPath::parse(""), Err(PathError::Empty));
        assert!(matches!(
            FieldPath::parse("a..b"),
            Err(PathError::EmptySegment(_))
        ));
    }
}
