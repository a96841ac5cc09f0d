use serde_json::{Number, Value};

use crate::config::FieldMapping;
use crate::record::{CHILD_KEY, COLOR_KEY, PARENT_KEY, Record, VALUE_KEY};
use crate::util::lenient_number;

/// Copies `records` with the mapped source columns renamed onto their
/// canonical attributes. The mapped value column is always coerced to a
/// float, malformed values becoming 0.
///
/// Every source column is read from the untouched input row before any
/// canonical slot is written, so a source named like another role's slot
/// (an id column called `name`, say) still lands where it is mapped.
pub fn remap(records: &[Record], mapping: &FieldMapping) -> Vec<Record> {
    let roles = [
        (mapping.parent_field.as_deref(), PARENT_KEY),
        (mapping.child_field.as_deref(), CHILD_KEY),
        (mapping.color_field.as_deref(), COLOR_KEY),
        (mapping.value_field.as_deref(), VALUE_KEY),
    ];

    records
        .iter()
        .map(|source| {
            let mut record = source.clone();

            let moved = roles
                .iter()
                .filter_map(|&(field, canonical)| Some((field?, canonical)))
                .filter(|(field, canonical)| field != canonical)
                .map(|(field, canonical)| (canonical, source.get(field).cloned()))
                .collect::<Vec<_>>();

            for &(field, canonical) in &roles {
                if let Some(field) = field
                    && field != canonical
                {
                    record.remove(field);
                }
            }

            for (canonical, value) in moved {
                match value {
                    Some(value) => {
                        record.insert(canonical.to_string(), value);
                    }
                    None => {
                        record.remove(canonical);
                    }
                }
            }

            if mapping.value_field.is_some() {
                let metric = record.get(VALUE_KEY).map(lenient_number).unwrap_or(0.0);
                record.insert(VALUE_KEY.to_string(), float_value(metric));
            }

            record
        })
        .collect()
}

fn float_value(metric: f64) -> Value {
    Number::from_f64(metric)
        .map(Value::Number)
        .unwrap_or_else(|| Value::from(0))
}
