//! Serialization of a [`QueryResult`] into the response document.

use serde_json::{Map, Value};

use crate::domain::result::QueryResult;

/// Render a result set as a compact JSON document: `{"data":[{col:val,...},...]}`.
///
/// Every cell is emitted as a JSON string. SQL NULL is emitted as the string
/// `"NULL"`, indistinguishable from a textual `NULL` in the data; downstream
/// consumers rely on this convention. Key order within each row object is the
/// declared column order, row order is retrieval order.
pub fn to_compact_json(result: &QueryResult) -> String {
    let data = result
        .rows
        .iter()
        .map(|row| {
            let mut object = Map::with_capacity(result.columns.len());
            for (column, cell) in result.columns.iter().zip(row) {
                let text = cell.as_deref().unwrap_or("NULL");
                object.insert(column.clone(), Value::String(text.to_string()));
            }
            Value::Object(object)
        })
        .collect();

    let mut root = Map::with_capacity(1);
    root.insert("data".to_string(), Value::Array(data));
    Value::Object(root).to_string()
}
