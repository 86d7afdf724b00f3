//! S-expression plist helpers shared by config files, stored reference
//! sequences and the control protocol.

use lexpr::Value;

/// Find the value following `:key` in a plist.
///
/// Walks cons pairs directly. Handles both `Value::Keyword("key")` (elisp
/// parser) and `Value::Symbol(":key")` (default parser) forms.
pub fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let prefixed = format!(":{}", key);
    let mut current = value;
    while let Value::Cons(pair) = current {
        let is_key = match pair.car() {
            Value::Keyword(k) => k.as_ref() == key,
            Value::Symbol(s) => s.as_ref() == prefixed,
            _ => false,
        };
        if is_key {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Extract a plist value rendered as a plain string (keywords lose their colon).
pub fn get_keyword(value: &Value, key: &str) -> Option<String> {
    let val = get_value(value, key)?;
    Some(match val {
        Value::Keyword(v) => v.to_string(),
        Value::Symbol(v) => {
            let s: &str = v;
            s.strip_prefix(':').unwrap_or(s).to_string()
        }
        Value::String(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => if *b { "t" } else { "nil" }.to_string(),
        Value::Null | Value::Nil => "nil".to_string(),
        other => other.to_string(),
    })
}

/// Extract an integer value from a plist.
pub fn get_int(value: &Value, key: &str) -> Option<i64> {
    get_keyword(value, key).and_then(|s| s.parse().ok())
}

/// Extract a floating-point value from a plist.
pub fn get_float(value: &Value, key: &str) -> Option<f64> {
    get_value(value, key).and_then(Value::as_f64)
}

/// Iterate the elements of a proper list. Returns an empty vec for non-lists.
pub fn list_items(value: &Value) -> Vec<&Value> {
    let mut items = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        items.push(pair.car());
        current = pair.cdr();
    }
    if let Value::Vector(elems) = value {
        items.extend(elems.iter());
    }
    items
}

/// Read a flat list of numbers. `None` if any element is not numeric.
pub fn numbers(value: &Value) -> Option<Vec<f32>> {
    list_items(value)
        .into_iter()
        .map(|v| v.as_f64().map(|n| n as f32))
        .collect()
}

/// Render a number list as `(a b c ...)`.
pub fn number_list(values: &[f32]) -> String {
    let mut s = String::with_capacity(values.len() * 8 + 2);
    s.push('(');
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        // Display for f32 never uses exponent notation, which the reader relies on.
        s.push_str(&format!("{}", v));
    }
    s.push(')');
    s
}

/// Elisp-style boolean.
pub fn bool_sexp(b: bool) -> &'static str {
    if b {
        "t"
    } else {
        "nil"
    }
}

/// Escape a string for s-expression output.
pub fn escape_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Quote and escape a string.
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", escape_string(s))
}

pub fn ok_response(id: i64) -> String {
    format!("(:type :response :id {} :status :ok)", id)
}

pub fn error_response(id: i64, reason: &str) -> String {
    format!(
        "(:type :response :id {} :status :error :reason {})",
        id,
        quoted(reason)
    )
}

/// Format an event s-expression.
pub fn format_event(event_type: &str, fields: &[(&str, String)]) -> String {
    let mut s = format!("(:type :event :event :{}", event_type);
    for (key, val) in fields {
        s.push_str(&format!(" :{} {}", key, val));
    }
    s.push(')');
    s
}
