pub mod models;
pub mod repository;
pub mod routes;
pub mod schema;

use std::sync::Arc;

use async_trait::async_trait;
use axum::{routing::get, Router};
use bookshelf_http::error::{ErrorBody, ErrorEnvelope};
use bookshelf_kernel::{InitCtx, Migration, Module};
use utoipa::OpenApi;

use models::{Book, BookEnvelope, BookList, BookUpdate, DeleteConfirmation};
use repository::BookRepository;

#[derive(OpenApi)]
#[openapi(
    paths(
        routes::list_books,
        routes::get_book,
        routes::create_book,
        routes::update_book,
        routes::delete_book
    ),
    components(schemas(
        Book,
        BookUpdate,
        BookList,
        BookEnvelope,
        DeleteConfirmation,
        ErrorEnvelope,
        ErrorBody
    )),
    tags((name = "books", description = "Book catalogue keyed by ISBN"))
)]
struct BooksApi;

/// Book catalogue: CRUD over the `books` table.
pub struct BooksModule {
    repository: BookRepository,
}

impl BooksModule {
    pub fn new(repository: BookRepository) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            environment = ?ctx.settings.environment,
            "books module initialized"
        );
        Ok(())
    }

    fn routes(&self) -> Router {
        Router::new()
            .route("/books", get(routes::list_books).post(routes::create_book))
            .route(
                "/books/{isbn}",
                get(routes::get_book)
                    .put(routes::update_book)
                    .delete(routes::delete_book),
            )
            .with_state(self.repository.clone())
    }

    fn openapi(&self) -> Option<utoipa::openapi::OpenApi> {
        Some(BooksApi::openapi())
    }

    fn migrations(&self) -> Vec<Migration> {
        migrations()
    }

    async fn start(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let stored = self.repository.count().await?;
        tracing::info!(module = self.name(), stored, "books module started");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::info!(module = self.name(), "books module stopped");
        Ok(())
    }
}

pub(crate) fn migrations() -> Vec<Migration> {
    vec![Migration {
        id: "001_create_books",
        up: r#"
            CREATE TABLE IF NOT EXISTS books (
                isbn       TEXT PRIMARY KEY,
                amazon_url TEXT NOT NULL,
                author     TEXT NOT NULL CHECK (length(trim(author)) > 0),
                language   TEXT NOT NULL,
                pages      INTEGER NOT NULL CHECK (pages > 0),
                publisher  TEXT NOT NULL,
                title      TEXT NOT NULL CHECK (length(trim(title)) > 0),
                year       INTEGER NOT NULL
            );
            "#,
    }]
}

/// Create a new instance of the books module
pub fn create_module(repository: BookRepository) -> Arc<dyn Module> {
    Arc::new(BooksModule::new(repository))
}
