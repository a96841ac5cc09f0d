use serde_json::{Map, Value};

use crate::util::{lenient_number, number_text};

/// One input row: attribute name to primitive JSON value.
pub type Record = Map<String, Value>;

pub const PARENT_KEY: &str = "name";
pub const CHILD_KEY: &str = "child";
pub const COLOR_KEY: &str = "colorHex";
pub const VALUE_KEY: &str = "valueMetric";
pub const CHILDREN_KEY: &str = "children";

/// Identifier text used to link parents and children. Strings and numbers
/// compare by their text so `1` and `"1"` refer to the same node. Null,
/// missing and structured values never link.
pub fn id_key(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number_text(number)),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

pub fn child_id(record: &Record) -> Option<String> {
    id_key(record.get(CHILD_KEY))
}

pub fn parent_id(record: &Record) -> Option<String> {
    id_key(record.get(PARENT_KEY))
}

pub fn is_root(record: &Record) -> bool {
    matches!(record.get(PARENT_KEY), None | Some(Value::Null))
}

/// `valueMetric` as a float, with missing or unparseable values read as 0.
pub fn value_metric(record: &Record) -> f64 {
    record
        .get(VALUE_KEY)
        .map(lenient_number)
        .unwrap_or(0.0)
}
