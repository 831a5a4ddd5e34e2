//! Payload schemas.
//!
//! Every action declares the shape of its payload. Incoming payloads are
//! checked against that shape before authorization and before any random
//! draw, so malformed input never touches state or the RNG stream.
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use turnkit::schema::Schema;
//!
//! let schema = Schema::object()
//!     .field("card", Schema::string())
//!     .optional("target", Schema::player());
//!
//! assert!(schema.validate(&json!({ "card": "A" }), 2).is_ok());
//!
//! let err = schema.validate(&json!({ "card": 7, "target": 5 }), 2).unwrap_err();
//! assert_eq!(err.violations.len(), 2);
//! ```

mod validate;

pub use validate::{SchemaError, Violation};

use serde::{Deserialize, Serialize};

/// A named field of an object schema.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
    pub required: bool,
}

/// Declared shape of a JSON payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Schema {
    /// Anything, including null.
    Any,
    /// Exactly `null`; the payload of argument-free actions.
    Null,
    Bool,
    Integer {
        min: Option<i64>,
        max: Option<i64>,
    },
    /// Any JSON number.
    Number,
    String {
        one_of: Option<Vec<String>>,
        max_len: Option<usize>,
    },
    /// A seat index below the game's player count.
    Player,
    Array {
        items: Box<Schema>,
        min_len: Option<usize>,
        max_len: Option<usize>,
    },
    Object {
        fields: Vec<Field>,
        allow_extra: bool,
    },
    /// `null` or the inner shape.
    Optional(Box<Schema>),
}

impl Schema {
    /// Unbounded integer.
    #[must_use]
    pub fn integer() -> Self {
        Schema::Integer {
            min: None,
            max: None,
        }
    }

    /// Integer within `min..=max`.
    #[must_use]
    pub fn int_range(min: i64, max: i64) -> Self {
        Schema::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    /// Unconstrained string.
    #[must_use]
    pub fn string() -> Self {
        Schema::String {
            one_of: None,
            max_len: None,
        }
    }

    /// String restricted to a fixed set of values.
    pub fn one_of<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Schema::String {
            one_of: Some(values.into_iter().map(Into::into).collect()),
            max_len: None,
        }
    }

    /// Seat index.
    #[must_use]
    pub fn player() -> Self {
        Schema::Player
    }

    /// Array of `items` with no length bounds.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_len: None,
            max_len: None,
        }
    }

    /// Array of `items` with `min..=max` elements.
    #[must_use]
    pub fn array_len(items: Schema, min: usize, max: usize) -> Self {
        Schema::Array {
            items: Box::new(items),
            min_len: Some(min),
            max_len: Some(max),
        }
    }

    /// Strict object with no fields yet; add them with [`field`](Self::field).
    #[must_use]
    pub fn object() -> Self {
        Schema::Object {
            fields: Vec::new(),
            allow_extra: false,
        }
    }

    /// `null` or `inner`.
    #[must_use]
    pub fn optional_of(inner: Schema) -> Self {
        Schema::Optional(Box::new(inner))
    }

    /// Add a required field to an object schema.
    ///
    /// Panics if `self` is not an object schema.
    #[must_use]
    pub fn field(self, name: impl Into<String>, schema: Schema) -> Self {
        self.push_field(name.into(), schema, true)
    }

    /// Add an optional field to an object schema.
    ///
    /// Panics if `self` is not an object schema.
    #[must_use]
    pub fn optional(self, name: impl Into<String>, schema: Schema) -> Self {
        self.push_field(name.into(), schema, false)
    }

    /// Accept keys not listed in the object schema.
    #[must_use]
    pub fn allow_extra(mut self) -> Self {
        if let Schema::Object { allow_extra, .. } = &mut self {
            *allow_extra = true;
        }
        self
    }

    /// Cap the length of a string schema.
    #[must_use]
    pub fn max_len(mut self, len: usize) -> Self {
        if let Schema::String { max_len, .. } = &mut self {
            *max_len = Some(len);
        }
        self
    }

    fn push_field(mut self, name: String, schema: Schema, required: bool) -> Self {
        match &mut self {
            Schema::Object { fields, .. } => {
                assert!(
                    fields.iter().all(|f| f.name != name),
                    "Field `{}` declared twice",
                    name
                );
                fields.push(Field {
                    name,
                    schema,
                    required,
                });
            }
            other => panic!("Cannot add field `{}` to non-object schema {:?}", name, other),
        }
        self
    }
}
