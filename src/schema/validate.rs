//! Validation of JSON values against a [`Schema`].

use serde_json::Value;
use thiserror::Error;

use super::Schema;
use crate::patch::escape_key;

/// One constraint a payload broke.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Pointer to the offending value (`""` is the payload root).
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Payload validation failure listing every violation found.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{}", render(.violations))]
pub struct SchemaError {
    pub violations: Vec<Violation>,
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SchemaError {
    /// A single violation at the payload root.
    pub fn root(message: impl Into<String>) -> Self {
        Self {
            violations: vec![Violation {
                path: String::new(),
                message: message.into(),
            }],
        }
    }
}

impl Schema {
    /// Check `value` against this schema.
    ///
    /// `player_count` bounds [`Schema::Player`] fields. Side-effect free.
    pub fn validate(&self, value: &Value, player_count: usize) -> Result<(), SchemaError> {
        let mut violations = Vec::new();
        let mut path = String::new();
        check(self, value, player_count, &mut path, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaError { violations })
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check(
    schema: &Schema,
    value: &Value,
    player_count: usize,
    path: &mut String,
    out: &mut Vec<Violation>,
) {
    let mut fail = |message: String| {
        out.push(Violation {
            path: path.clone(),
            message,
        })
    };

    match schema {
        Schema::Any => {}
        Schema::Null => {
            if !value.is_null() {
                fail(format!("expected null, found {}", type_name(value)));
            }
        }
        Schema::Bool => {
            if !value.is_boolean() {
                fail(format!("expected bool, found {}", type_name(value)));
            }
        }
        Schema::Number => {
            if !value.is_number() {
                fail(format!("expected number, found {}", type_name(value)));
            }
        }
        Schema::Integer { min, max } => match value.as_i64() {
            None => fail(format!("expected integer, found {}", type_name(value))),
            Some(n) => {
                if let Some(min) = min.filter(|&m| n < m) {
                    fail(format!("{} is below minimum {}", n, min));
                }
                if let Some(max) = max.filter(|&m| n > m) {
                    fail(format!("{} is above maximum {}", n, max));
                }
            }
        },
        Schema::String { one_of, max_len } => match value.as_str() {
            None => fail(format!("expected string, found {}", type_name(value))),
            Some(s) => {
                if let Some(allowed) = one_of {
                    if !allowed.iter().any(|a| a == s) {
                        fail(format!("`{}` is not one of {:?}", s, allowed));
                    }
                }
                if let Some(max) = max_len.filter(|&m| s.chars().count() > m) {
                    fail(format!("string longer than {}", max));
                }
            }
        },
        Schema::Player => match value.as_u64() {
            Some(n) if usize::try_from(n).map_or(false, |n| n < player_count) => {}
            Some(n) => fail(format!("player {} out of range for {} players", n, player_count)),
            None => fail(format!("expected player index, found {}", type_name(value))),
        },
        Schema::Optional(inner) => {
            if !value.is_null() {
                check(inner, value, player_count, path, out);
            }
        }
        Schema::Array {
            items,
            min_len,
            max_len,
        } => match value.as_array() {
            None => fail(format!("expected array, found {}", type_name(value))),
            Some(elements) => {
                if let Some(min) = min_len.filter(|&m| elements.len() < m) {
                    fail(format!("expected at least {} elements, found {}", min, elements.len()));
                }
                if let Some(max) = max_len.filter(|&m| elements.len() > m) {
                    fail(format!("expected at most {} elements, found {}", max, elements.len()));
                }
                for (i, element) in elements.iter().enumerate() {
                    let len = path.len();
                    path.push('/');
                    path.push_str(&i.to_string());
                    check(items, element, player_count, path, out);
                    path.truncate(len);
                }
            }
        },
        Schema::Object {
            fields,
            allow_extra,
        } => match value.as_object() {
            None => fail(format!("expected object, found {}", type_name(value))),
            Some(map) => {
                let mut missing = Vec::new();
                let mut extra = Vec::new();
                for field in fields {
                    if field.required && !map.contains_key(&field.name) {
                        missing.push(field.name.as_str());
                    }
                }
                if !allow_extra {
                    for key in map.keys() {
                        if !fields.iter().any(|f| &f.name == key) {
                            extra.push(key.as_str());
                        }
                    }
                }
                for name in missing {
                    fail(format!("missing required field `{}`", name));
                }
                for key in extra {
                    fail(format!("unexpected field `{}`", key));
                }
                for field in fields {
                    if let Some(child) = map.get(&field.name) {
                        let len = path.len();
                        path.push('/');
                        path.push_str(&escape_key(&field.name));
                        check(&field.schema, child, player_count, path, out);
                        path.truncate(len);
                    }
                }
            }
        },
    }
}
