use std::fmt;

use reqwest::Method;
use serde_json::Value;

/// Identity of a logical request, used to collapse concurrent duplicates.
///
/// Headers are not part of the key, so the same call made before and after a
/// token refresh maps to the same key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    /// Absent body or params serialize as `{}`, so "no body" and an empty
    /// object are the same request.
    pub fn derive(method: &Method, url: &str, body: Option<&Value>, params: Option<&Value>) -> Self {
        Self(format!(
            "{method}|{url}|{}|{}",
            canonical(body),
            canonical(params)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn canonical(value: Option<&Value>) -> String {
    match value {
        Some(Value::Null) | None => "{}".to_string(),
        Some(value) => {
            let mut out = String::new();
            write_canonical(value, &mut out);
            out
        }
    }
}

/// Compact JSON with object keys sorted at every depth, whatever order the map keeps.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<_> = fields.iter().collect();
            entries.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));
            out.push('{');
            for (i, (name, field)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(name.clone()).to_string());
                out.push(':');
                write_canonical(field, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
