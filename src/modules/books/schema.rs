//! Write-payload validation for the books module.
//!
//! A [`Schema`] is a closed field set: every declared field is required, no
//! undeclared field may appear, and values are never coerced. Validation
//! reports every violation it finds instead of stopping at the first one.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

/// Constraint applied to a single field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    NonEmptyText,
    Integer,
    PositiveInteger,
}

impl FieldKind {
    fn type_name(self) -> &'static str {
        match self {
            FieldKind::Text | FieldKind::NonEmptyText => "string",
            FieldKind::Integer | FieldKind::PositiveInteger => "integer",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldRule {
    FieldRule { name, kind }
}

/// Named, closed set of required fields.
#[derive(Debug, Clone, Copy)]
pub struct Schema {
    pub name: &'static str,
    pub fields: &'static [FieldRule],
}

/// Payload accepted by `POST /books`.
pub const BOOK_CREATE: Schema = Schema {
    name: "book",
    fields: &[
        field("isbn", FieldKind::NonEmptyText),
        field("amazon_url", FieldKind::Text),
        field("author", FieldKind::NonEmptyText),
        field("language", FieldKind::Text),
        field("pages", FieldKind::PositiveInteger),
        field("publisher", FieldKind::Text),
        field("title", FieldKind::NonEmptyText),
        field("year", FieldKind::Integer),
    ],
};

/// Payload accepted by `PUT /books/{isbn}`; the key is not part of it.
pub const BOOK_UPDATE: Schema = Schema {
    name: "book update",
    fields: &[
        field("amazon_url", FieldKind::Text),
        field("author", FieldKind::NonEmptyText),
        field("language", FieldKind::Text),
        field("pages", FieldKind::PositiveInteger),
        field("publisher", FieldKind::Text),
        field("title", FieldKind::NonEmptyText),
        field("year", FieldKind::Integer),
    ],
};

/// A single broken rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    NotAnObject { found: &'static str },
    Missing { field: &'static str },
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
    Empty { field: &'static str },
    NotPositive { field: &'static str },
    Unexpected { field: String },
    Malformed { reason: String },
}

impl Violation {
    fn rule(&self) -> &'static str {
        match self {
            Violation::NotAnObject { .. } => "not_an_object",
            Violation::Missing { .. } => "missing",
            Violation::WrongType { .. } => "wrong_type",
            Violation::Empty { .. } => "empty",
            Violation::NotPositive { .. } => "not_positive",
            Violation::Unexpected { .. } => "unexpected",
            Violation::Malformed { .. } => "malformed",
        }
    }

    fn field(&self) -> &str {
        match self {
            Violation::NotAnObject { .. } | Violation::Malformed { .. } => "$root",
            Violation::Missing { field }
            | Violation::WrongType { field, .. }
            | Violation::Empty { field }
            | Violation::NotPositive { field } => field,
            Violation::Unexpected { field } => field,
        }
    }

    /// Machine-readable form used in error response details.
    pub fn to_detail(&self) -> Value {
        json!({
            "field": self.field(),
            "rule": self.rule(),
            "message": self.to_string(),
        })
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::NotAnObject { found } => {
                write!(f, "payload must be a JSON object, found {}", found)
            }
            Violation::Missing { field } => write!(f, "'{}' is required", field),
            Violation::WrongType {
                field,
                expected,
                found,
            } => write!(f, "'{}' must be {}, found {}", field, expected, found),
            Violation::Empty { field } => write!(f, "'{}' must not be empty", field),
            Violation::NotPositive { field } => write!(f, "'{}' must be positive", field),
            Violation::Unexpected { field } => write!(f, "'{}' is not allowed", field),
            Violation::Malformed { reason } => write!(f, "payload is malformed: {}", reason),
        }
    }
}

/// Rejected payload with every violated rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {schema}: {}", join(.violations))]
pub struct ValidationError {
    pub schema: &'static str,
    pub violations: Vec<Violation>,
}

fn join(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(Violation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Schema {
    /// Check `payload` against the field set without consuming it.
    pub fn validate(&self, payload: &Value) -> Result<(), ValidationError> {
        let violations = match payload.as_object() {
            Some(object) => self.check_object(object),
            None => vec![Violation::NotAnObject {
                found: json_type_name(payload),
            }],
        };

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError {
                schema: self.name,
                violations,
            })
        }
    }

    /// Validate and convert `payload` into its typed form.
    pub fn parse<T: DeserializeOwned>(&self, payload: Value) -> Result<T, ValidationError> {
        self.validate(&payload)?;
        serde_json::from_value(payload).map_err(|e| {
            // Only reachable if the typed form and the field set disagree.
            tracing::error!(schema = self.name, error = %e, "validated payload failed to decode");
            ValidationError {
                schema: self.name,
                violations: vec![Violation::Malformed {
                    reason: e.to_string(),
                }],
            }
        })
    }

    fn check_object(&self, object: &Map<String, Value>) -> Vec<Violation> {
        let mut violations: Vec<Violation> = self
            .fields
            .iter()
            .filter_map(|rule| match object.get(rule.name) {
                None => Some(Violation::Missing { field: rule.name }),
                Some(value) => check_value(rule, value),
            })
            .collect();

        violations.extend(
            object
                .keys()
                .filter(|key| !self.fields.iter().any(|rule| rule.name == key.as_str()))
                .map(|key| Violation::Unexpected { field: key.clone() }),
        );

        violations
    }
}

fn check_value(rule: &FieldRule, value: &Value) -> Option<Violation> {
    let wrong_type = || Violation::WrongType {
        field: rule.name,
        expected: rule.kind.type_name(),
        found: json_type_name(value),
    };

    match rule.kind {
        FieldKind::Text => value.as_str().is_none().then(wrong_type),
        FieldKind::NonEmptyText => match value.as_str() {
            None => Some(wrong_type()),
            Some(text) if text.trim().is_empty() => Some(Violation::Empty { field: rule.name }),
            Some(_) => None,
        },
        FieldKind::Integer => value.as_i64().is_none().then(wrong_type),
        FieldKind::PositiveInteger => match value.as_i64() {
            None => Some(wrong_type()),
            Some(n) if n <= 0 => Some(Violation::NotPositive { field: rule.name }),
            Some(_) => None,
        },
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::models::{Book, BookUpdate};

    fn complete_book() -> Value {
        json!({
            "isbn": "0691161518",
            "amazon_url": "http://a.co/eobPtX2",
            "author": "Matthew Lane",
            "language": "english",
            "pages": 264,
            "publisher": "Princeton University Press",
            "title": "Power-Up: Unlocking the Hidden Mathematics in Video Games",
            "year": 2017
        })
    }

    fn without(mut payload: Value, field: &str) -> Value {
        payload.as_object_mut().unwrap().remove(field);
        payload
    }

    #[test]
    fn complete_payload_parses() {
        let book: Book = BOOK_CREATE.parse(complete_book()).unwrap();
        assert_eq!(book.isbn, "0691161518");
        assert_eq!(book.pages, 264);
    }

    #[test]
    fn every_missing_field_is_rejected() {
        for rule in BOOK_CREATE.fields {
            let err = BOOK_CREATE
                .validate(&without(complete_book(), rule.name))
                .unwrap_err();
            assert_eq!(err.violations, vec![Violation::Missing { field: rule.name }]);
        }
    }

    #[test]
    fn every_missing_update_field_is_rejected() {
        assert_eq!(BOOK_UPDATE.fields.len(), 7);
        for rule in BOOK_UPDATE.fields {
            let payload = without(without(complete_book(), "isbn"), rule.name);
            let err = BOOK_UPDATE.validate(&payload).unwrap_err();
            assert_eq!(err.violations, vec![Violation::Missing { field: rule.name }]);
        }
    }

    #[test]
    fn isbn_only_payload_reports_all_missing_fields() {
        let err = BOOK_CREATE
            .validate(&json!({"isbn": "12312323123"}))
            .unwrap_err();
        assert_eq!(err.violations.len(), 7);
        assert!(err
            .violations
            .iter()
            .all(|v| matches!(v, Violation::Missing { .. })));
    }

    #[test]
    fn update_rejects_isbn_in_body() {
        let err = BOOK_UPDATE.validate(&complete_book()).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Violation::Unexpected {
                field: "isbn".to_string()
            }]
        );
    }

    #[test]
    fn update_accepts_non_key_fields() {
        let update: BookUpdate = BOOK_UPDATE
            .parse(without(complete_book(), "isbn"))
            .unwrap();
        assert_eq!(update.author, "Matthew Lane");
    }

    #[test]
    fn value_constraints_are_enforced() {
        let mut payload = complete_book();
        payload["pages"] = json!(0);
        payload["title"] = json!("   ");
        payload["year"] = json!("2017");
        payload["language"] = Value::Null;

        let err = BOOK_CREATE.validate(&payload).unwrap_err();
        assert_eq!(
            err.violations,
            vec![
                Violation::WrongType {
                    field: "language",
                    expected: "string",
                    found: "null"
                },
                Violation::NotPositive { field: "pages" },
                Violation::Empty { field: "title" },
                Violation::WrongType {
                    field: "year",
                    expected: "integer",
                    found: "string"
                },
            ]
        );
    }

    #[test]
    fn fractional_pages_are_not_integers() {
        let mut payload = complete_book();
        payload["pages"] = json!(264.5);
        let err = BOOK_CREATE.validate(&payload).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Violation::WrongType {
                field: "pages",
                expected: "integer",
                found: "number"
            }]
        );
    }

    #[test]
    fn integers_beyond_i64_are_reported_as_numbers() {
        let mut payload = without(complete_book(), "isbn");
        payload["pages"] = json!(u64::MAX);
        let err = BOOK_UPDATE.validate(&payload).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Violation::WrongType {
                field: "pages",
                expected: "integer",
                found: "number"
            }]
        );
        assert_eq!(
            err.to_string(),
            "invalid book update: 'pages' must be integer, found number"
        );
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = BOOK_CREATE.validate(&json!([1, 2])).unwrap_err();
        assert_eq!(err.violations, vec![Violation::NotAnObject { found: "array" }]);
    }

    #[test]
    fn error_message_lists_every_violation() {
        let err = BOOK_UPDATE
            .validate(&json!({"isbn": "1", "pages": -3}))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("invalid book update: "));
        assert!(message.contains("'amazon_url' is required"));
        assert!(message.contains("'pages' must be positive"));
        assert!(message.contains("'isbn' is not allowed"));

        let detail = err.violations[0].to_detail();
        assert_eq!(detail["field"], "amazon_url");
        assert_eq!(detail["rule"], "missing");
    }
}
