//! Keyset cursors and document ordering.
//!
//! Pagination captures the last-seen document's sort-key values and id and
//! requests strictly-after it. Unlike offset pagination, concurrent inserts
//! before the cursor cannot skip or duplicate rows in later pages.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{SortDir, SortKey};
use crate::store::Document;

/// Total order over JSON values, by type class then value.
///
/// null < bool < number < string < array < object; numbers compare as f64,
/// arrays lexicographically, objects by their serialized form. Totality is
/// what makes keyset comparison well-defined for any field.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(f64::NAN);
            let y = y.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (xi, yi) in x.iter().zip(y.iter()) {
                match compare_values(xi, yi) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
            x.len().cmp(&y.len())
        }
        (Value::Object(_), Value::Object(_)) => a.to_string().cmp(&b.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn sort_field(doc: &Document, key: &SortKey) -> Value {
    doc.field(&key.field).cloned().unwrap_or(Value::Null)
}

/// Order two documents by the descriptor's sort keys, with the document id
/// as the final ascending tiebreak. The tiebreak is what makes cursors
/// unambiguous between equal sort keys.
pub fn compare_docs(a: &Document, b: &Document, sort: &[SortKey]) -> Ordering {
    for key in sort {
        let ordering = compare_values(&sort_field(a, key), &sort_field(b, key));
        let ordering = match key.dir {
            SortDir::Asc => ordering,
            SortDir::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

/// Keyset position: the sort-key values and id of the last seen document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    sort_values: Vec<Value>,
    doc_id: String,
}

impl Cursor {
    /// Capture the position just after `doc` under `sort`.
    pub fn after(doc: &Document, sort: &[SortKey]) -> Self {
        Self {
            sort_values: sort.iter().map(|key| sort_field(doc, key)).collect(),
            doc_id: doc.id.clone(),
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Whether `doc` lies strictly after this cursor under `sort`.
    pub fn admits(&self, doc: &Document, sort: &[SortKey]) -> bool {
        for (key, cursor_value) in sort.iter().zip(&self.sort_values) {
            let ordering = compare_values(&sort_field(doc, key), cursor_value);
            let ordering = match key.dir {
                SortDir::Asc => ordering,
                SortDir::Desc => ordering.reverse(),
            };
            match ordering {
                Ordering::Greater => return true,
                Ordering::Less => return false,
                Ordering::Equal => continue,
            }
        }
        doc.id.as_str() > self.doc_id.as_str()
    }
}
