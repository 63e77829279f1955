//! HTTP handlers for `/books`.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use bookshelf_http::error::{AppError, ErrorEnvelope};
use serde_json::Value;

use super::models::{Book, BookEnvelope, BookList, BookUpdate, DeleteConfirmation};
use super::repository::{BookRepository, RepositoryError};
use super::schema::{ValidationError, BOOK_CREATE, BOOK_UPDATE};

impl From<RepositoryError> for AppError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound { .. } => AppError::not_found(error.to_string()),
            RepositoryError::Conflict { ref isbn } => AppError::conflict(
                vec![serde_json::json!({ "field": "isbn", "value": isbn })],
                error.to_string(),
            ),
            RepositoryError::Database(e) => AppError::Internal(e.into()),
        }
    }
}

impl From<ValidationError> for AppError {
    fn from(error: ValidationError) -> Self {
        let details = error.violations.iter().map(|v| v.to_detail()).collect();
        AppError::validation(details, error.to_string())
    }
}

/// Unwrap a JSON body, turning unreadable input into a 400.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, AppError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

/// Unwrap the `{isbn}` segment; undecodable segments become a 400.
fn isbn_param(path: Result<Path<String>, PathRejection>) -> Result<String, AppError> {
    path.map(|Path(isbn)| isbn)
        .map_err(|rejection| AppError::bad_request(rejection.body_text()))
}

#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "Every book", body = BookList),
        (status = 500, description = "Internal server error", body = ErrorEnvelope)
    )
)]
pub async fn list_books(State(repo): State<BookRepository>) -> Result<Json<BookList>, AppError> {
    let books = repo.list_all().await?;
    Ok(Json(BookList { books }))
}

#[utoipa::path(
    get,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Book ISBN")),
    responses(
        (status = 200, description = "The book", body = BookEnvelope),
        (status = 404, description = "No book with this isbn", body = ErrorEnvelope)
    )
)]
pub async fn get_book(
    State(repo): State<BookRepository>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<BookEnvelope>, AppError> {
    let book = repo.get_by_isbn(&isbn_param(path)?).await?;
    Ok(Json(BookEnvelope { book }))
}

#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = Book,
    responses(
        (status = 201, description = "Book created", body = BookEnvelope),
        (status = 400, description = "Payload failed validation", body = ErrorEnvelope),
        (status = 409, description = "A book with this isbn exists", body = ErrorEnvelope)
    )
)]
pub async fn create_book(
    State(repo): State<BookRepository>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<BookEnvelope>), AppError> {
    let book: Book = BOOK_CREATE.parse(json_body(body)?)?;
    let book = repo.create(&book).await?;
    tracing::info!(isbn = %book.isbn, "book created");
    Ok((StatusCode::CREATED, Json(BookEnvelope { book })))
}

#[utoipa::path(
    put,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Book ISBN")),
    request_body = BookUpdate,
    responses(
        (status = 200, description = "Book replaced", body = BookEnvelope),
        (status = 400, description = "Payload failed validation", body = ErrorEnvelope),
        (status = 404, description = "No book with this isbn", body = ErrorEnvelope)
    )
)]
pub async fn update_book(
    State(repo): State<BookRepository>,
    path: Result<Path<String>, PathRejection>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<BookEnvelope>, AppError> {
    let isbn = isbn_param(path)?;
    let fields: BookUpdate = BOOK_UPDATE.parse(json_body(body)?)?;
    let book = repo.update(&isbn, &fields).await?;
    tracing::info!(isbn = %book.isbn, "book updated");
    Ok(Json(BookEnvelope { book }))
}

#[utoipa::path(
    delete,
    path = "/books/{isbn}",
    tag = "books",
    params(("isbn" = String, Path, description = "Book ISBN")),
    responses(
        (status = 200, description = "Book deleted", body = DeleteConfirmation),
        (status = 404, description = "No book with this isbn", body = ErrorEnvelope)
    )
)]
pub async fn delete_book(
    State(repo): State<BookRepository>,
    path: Result<Path<String>, PathRejection>,
) -> Result<Json<DeleteConfirmation>, AppError> {
    let isbn = isbn_param(path)?;
    repo.delete(&isbn).await?;
    tracing::info!(isbn = %isbn, "book deleted");
    Ok(Json(DeleteConfirmation::deleted()))
}
