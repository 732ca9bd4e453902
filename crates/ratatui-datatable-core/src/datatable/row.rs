use super::path::FieldPath;
use serde_json::Map;
use serde_json::Value;
use std::fmt;

/// Stable internal row identity. Allocated once per row and never reused by the same store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

impl RowId {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row-{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub is_new: bool,
    /// The host's object. Never carries internal fields.
    pub data: Value,
}

impl Row {
    pub fn get(&self, path: &FieldPath) -> Option<&Value> {
        path.get(&self.data)
    }
}

/// Working copy of the table's rows, keyed by [`RowId`].
#[derive(Debug, Default)]
pub struct RowStore {
    rows: Vec<Row>,
    next_id: u64,
}

impl RowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every row. Previously issued ids are not reused.
    pub fn replace_all(&mut self, data: Vec<Value>) {
        self.rows = data
            .into_iter()
            .map(|value| {
                let id = self.alloc_id();
                Row {
                    id,
                    is_new: false,
                    data: normalize(value),
                }
            })
            .collect();
    }

    /// Prepends a fresh `is_new` row and returns its id.
    pub fn add(&mut self) -> RowId {
        let id = self.alloc_id();
        self.rows.insert(
            0,
            Row {
                id,
                is_new: true,
                data: Value::Object(Map::new()),
            },
        );
        id
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.iter().find(|r| r.id == id)
    }

    pub fn get_mut(&mut self, id: RowId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|r| r.id == id)
    }

    pub fn position(&self, id: RowId) -> Option<usize> {
        self.rows.iter().position(|r| r.id == id)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.position(id).is_some()
    }

    /// Swaps in a committed row object. Returns `false` if the row is gone.
    pub fn replace_data(&mut self, id: RowId, data: Value) -> bool {
        match self.get_mut(id) {
            Some(row) => {
                row.data = normalize(data);
                true
            }
            None => false,
        }
    }

    /// Clears the `is_new` flag. Returns `false` if the row is gone or was not new.
    pub fn mark_saved(&mut self, id: RowId) -> bool {
        match self.get_mut(id) {
            Some(row) if row.is_new => {
                row.is_new = false;
                true
            }
            _ => false,
        }
    }

    pub fn remove(&mut self, id: RowId) -> Option<Row> {
        let idx = self.position(id)?;
        Some(self.rows.remove(idx))
    }

    /// Flags a row as deleted through `field` instead of removing it.
    pub fn soft_delete(&mut self, id: RowId, field: &FieldPath) -> bool {
        let Some(row) = self.get_mut(id) else {
            return false;
        };
        match field.set(&mut row.data, Value::Bool(true)) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("soft delete of {id} failed: {err}");
                false
            }
        }
    }

    /// Host-facing copy of the data: every saved row, internal fields stripped.
    pub fn sanitized(&self) -> Vec<Value> {
        self.rows
            .iter()
            .filter(|r| !r.is_new)
            .map(|r| r.data.clone())
            .collect()
    }

    fn alloc_id(&mut self) -> RowId {
        self.next_id += 1;
        RowId(self.next_id)
    }
}

fn normalize(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        Value::Null => Value::Object(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeSet;

    #[test]
    fn ids_are_unique_and_never_reused() {
        let mut store = RowStore::new();
        store.replace_all(vec![json!({"a": 1}), json!({"a": 1}), json!({"a": 2})]);
        let first: BTreeSet<RowId> = store.iter().map(|r| r.id).collect();
        assert_eq!(first.len(), 3);

        store.replace_all(vec![json!({"a": 1})]);
        let second = store.rows()[0].id;
        assert!(!first.contains(&second));
    }

    #[test]
    fn new_rows_are_prepended_and_hidden_from_sanitized() {
        let mut store = RowStore::new();
        store.replace_all(vec![json!({"a": 1})]);
        let id = store.add();
        assert_eq!(store.rows()[0].id, id);
        assert!(store.rows()[0].is_new);
        assert_eq!(store.sanitized(), vec![json!({"a": 1})]);

        assert!(store.mark_saved(id));
        assert_eq!(store.sanitized().len(), 2);
    }

    #[test]
    fn soft_delete_keeps_the_row() {
        let mut store = RowStore::new();
        store.replace_all(vec![json!({"a": 1})]);
        let id = store.rows()[0].id;
        let flag = FieldPath::parse("isSoftDelete").unwrap();
        assert!(store.soft_delete(id, &flag));
        assert_eq!(store.sanitized(), vec![json!({"a": 1, "isSoftDelete": true})]);
    }
}
