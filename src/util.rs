use serde_json::{Number, Value};

/// Reads a JSON value as a float. Numbers pass through, strings are parsed
/// from their longest leading decimal prefix. Anything else, and any
/// non-finite result, reads as 0.
pub fn lenient_number(value: &Value) -> f64 {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => leading_float(text),
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    };

    parsed.filter(|value| value.is_finite()).unwrap_or(0.0)
}

/// Parses `[sign] digits [. digits] [e [sign] digits]` from the start of
/// `text`, ignoring leading whitespace and any trailing garbage.
pub fn leading_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0usize;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;

    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut cursor = frac_start;
        while bytes.get(cursor).is_some_and(u8::is_ascii_digit) {
            cursor += 1;
        }
        if digits > 0 || cursor > frac_start {
            digits += cursor - frac_start;
            end = cursor;
        }
    }

    if digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut cursor = end + 1;
        if matches!(bytes.get(cursor), Some(b'+' | b'-')) {
            cursor += 1;
        }
        let exp_start = cursor;
        while bytes.get(cursor).is_some_and(u8::is_ascii_digit) {
            cursor += 1;
        }
        if cursor > exp_start {
            end = cursor;
        }
    }

    text[..end].parse::<f64>().ok()
}

/// Short text for a record attribute, as shown in tooltips.
pub fn display_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number_text(number),
        Some(other) => other.to_string(),
    }
}

/// Decimal text for a JSON number; integral floats print without a fraction.
pub fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => format!("{}", float as i64),
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn leading_float_accepts_numeric_prefixes() {
        assert_eq!(leading_float("10"), Some(10.0));
        assert_eq!(leading_float("  -3.5kg"), Some(-3.5));
        assert_eq!(leading_float(".5"), Some(0.5));
        assert_eq!(leading_float("5."), Some(5.0));
        assert_eq!(leading_float("1e3x"), Some(1000.0));
        assert_eq!(leading_float("2e"), Some(2.0));
        assert_eq!(leading_float("abc"), None);
        assert_eq!(leading_float("-"), None);
        assert_eq!(leading_float(""), None);
        assert_eq!(leading_float("."), None);
    }

    #[test]
    fn lenient_number_falls_back_to_zero() {
        assert_eq!(lenient_number(&json!("abc")), 0.0);
        assert_eq!(lenient_number(&Value::Null), 0.0);
        assert_eq!(lenient_number(&json!(true)), 0.0);
        assert_eq!(lenient_number(&json!("1e400")), 0.0);
        assert_eq!(lenient_number(&json!(12.25)), 12.25);
        assert_eq!(lenient_number(&json!("12px")), 12.0);
    }

    #[test]
    fn display_value_drops_integral_fraction() {
        assert_eq!(display_value(Some(&json!(10.0))), "10");
        assert_eq!(display_value(Some(&json!(2.5))), "2.5");
        assert_eq!(display_value(Some(&json!("x"))), "x");
        assert_eq!(display_value(None), "");
    }
}
