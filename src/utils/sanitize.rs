use serde_json::Value;

/// Masks contact details and credentials in JSON payloads before they
/// reach the logs.
pub fn sanitize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, val) in map {
                let sanitized_val = if is_sensitive_field(key) {
                    mask_value(val)
                } else {
                    sanitize_json(val)
                };
                sanitized.insert(key.clone(), sanitized_val);
            }
            Value::Object(sanitized)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sanitize_json).collect()),
        _ => value.clone(),
    }
}

fn is_sensitive_field(key: &str) -> bool {
    matches!(
        key.to_lowercase().as_str(),
        "phone"
            | "phone_number"
            | "confirmation_contact"
            | "email"
            | "password"
            | "secret"
            | "token"
            | "api_key"
            | "authorization"
    )
}

fn mask_value(value: &Value) -> Value {
    if let Value::String(s) = value {
        if s.len() > 8 {
            // byte-indexed, guard against multi-byte boundaries
            if let (Some(visible), Some(end)) = (s.get(..4), s.get(s.len() - 4..)) {
                return Value::String(format!("{visible}****{end}"));
            }
        }
    }
    Value::String("****".to_string())
}
