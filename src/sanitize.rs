//! String and record sanitization
//!
//! Tag data comes straight from untrusted files, so every string a backend
//! hands to the aggregator is neutralized first: markup-significant
//! characters escaped, control characters stripped, length bounded.

use crate::types::{Record, Value};

/// Maximum length of a sanitized string, in code units
const MAX_STRING_LENGTH: usize = 1000;

/// Sanitize a single string: escape markup, drop control characters, truncate.
pub fn sanitize_string(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c if is_control(c) => {}
            c => out.push(c),
        }
    }

    if out.len() > MAX_STRING_LENGTH {
        out.chars().take(MAX_STRING_LENGTH).collect()
    } else {
        out
    }
}

/// C0 and C1 control ranges plus DEL
fn is_control(c: char) -> bool {
    let code = c as u32;
    code < 0x20 || (0x7F..=0x9F).contains(&code)
}

/// Sanitize every string leaf of a record, recursing into maps and lists.
///
/// Non-string leaves (numbers, the sentinel aside, which is plain text and
/// passes through unchanged) are left untouched.
pub fn sanitize_record(record: &mut Record) {
    for value in record.0.values_mut() {
        sanitize_value(value);
    }
}

fn sanitize_value(value: &mut Value) {
    match value {
        Value::Text(s) => *s = sanitize_string(s),
        Value::List(items) => {
            for item in items {
                sanitize_value(item);
            }
        }
        Value::Map(map) => sanitize_record(map),
        Value::Integer(_) | Value::Float(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markup_escaped() {
        assert_eq!(
            sanitize_string("<script>alert('x')</script>"),
            "&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;"
        );
        assert_eq!(sanitize_string("Simon & Garfunkel"), "Simon &amp; Garfunkel");
    }

    #[test]
    fn test_control_characters_stripped() {
        assert_eq!(sanitize_string("ti\x00tle\x1b"), "title");
        assert_eq!(sanitize_string("a\u{7f}b\u{9f}c"), "abc");
    }

    #[test]
    fn test_truncation() {
        let long = "x".repeat(5000);
        assert_eq!(sanitize_string(&long).chars().count(), 1000);
    }

    #[test]
    fn test_sentinel_passes_through() {
        assert_eq!(sanitize_string("Unknown"), "Unknown");
    }

    #[test]
    fn test_record_recursion() {
        let mut inner = Record::new();
        inner.insert("Encoder", "LAME <3.100>");
        let mut record = Record::new();
        record.insert("Title", "a<b");
        record.insert("Device Information", Value::Map(inner));
        record.insert("Year", 1999i64);
        record.insert(
            "Tags",
            Value::List(vec![Value::Text("<x>".to_string()), Value::Integer(3)]),
        );

        sanitize_record(&mut record);

        assert_eq!(
            record.get("Title").and_then(Value::as_text),
            Some("a&lt;b")
        );
        assert_eq!(
            record.get_path(&["Device Information", "Encoder"]).and_then(Value::as_text),
            Some("LAME &lt;3.100&gt;")
        );
        assert_eq!(record.get("Year").and_then(Value::as_i64), Some(1999));
        match record.get("Tags") {
            Some(Value::List(items)) => {
                assert_eq!(items[0], Value::Text("&lt;x&gt;".to_string()));
                assert_eq!(items[1], Value::Integer(3));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
