use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A catalogued book, keyed by its ISBN.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct Book {
    /// Unique, immutable identifier
    #[schema(example = "0691161518")]
    pub isbn: String,
    /// Informational store link
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    /// Page count, always positive
    pub pages: i64,
    pub publisher: String,
    pub title: String,
    pub year: i64,
}

impl Book {
    /// Assemble a book from its key and a full set of non-key fields.
    pub fn from_parts(isbn: impl Into<String>, fields: BookUpdate) -> Self {
        Self {
            isbn: isbn.into(),
            amazon_url: fields.amazon_url,
            author: fields.author,
            language: fields.language,
            pages: fields.pages,
            publisher: fields.publisher,
            title: fields.title,
            year: fields.year,
        }
    }
}

/// Full replacement of every non-key field; `isbn` comes from the path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct BookUpdate {
    pub amazon_url: String,
    pub author: String,
    pub language: String,
    pub pages: i64,
    pub publisher: String,
    pub title: String,
    pub year: i64,
}

/// `{"books": [...]}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookList {
    pub books: Vec<Book>,
}

/// `{"book": {...}}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BookEnvelope {
    pub book: Book,
}

/// `{"message": "Book deleted"}`
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteConfirmation {
    pub message: String,
}

impl DeleteConfirmation {
    pub fn deleted() -> Self {
        Self {
            message: "Book deleted".to_string(),
        }
    }
}
