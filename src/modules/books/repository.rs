use sqlx::SqlitePool;

use super::models::{Book, BookUpdate};

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("There is no book with an isbn {isbn}")]
    NotFound { isbn: String },

    #[error("A book with isbn {isbn} already exists")]
    Conflict { isbn: String },

    #[error("database failure: {0}")]
    Database(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Persistence for the `books` table. Every call is a single statement.
#[derive(Clone)]
pub struct BookRepository {
    pool: SqlitePool,
}

impl BookRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> RepositoryResult<Vec<Book>> {
        let books = sqlx::query_as::<_, Book>(
            // language=sqlite
            r#"
            SELECT isbn, amazon_url, author, language, pages, publisher, title, year
            FROM books
            ORDER BY title
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(books)
    }

    /// Number of stored books.
    pub async fn count(&self) -> RepositoryResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn get_by_isbn(&self, isbn: &str) -> RepositoryResult<Book> {
        sqlx::query_as::<_, Book>(
            // language=sqlite
            r#"
            SELECT isbn, amazon_url, author, language, pages, publisher, title, year
            FROM books
            WHERE isbn = ?1
            "#,
        )
        .bind(isbn)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(isbn))
    }

    pub async fn create(&self, book: &Book) -> RepositoryResult<Book> {
        sqlx::query_as::<_, Book>(
            // language=sqlite
            r#"
            INSERT INTO books (isbn, amazon_url, author, language, pages, publisher, title, year)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            RETURNING isbn, amazon_url, author, language, pages, publisher, title, year
            "#,
        )
        .bind(&book.isbn)
        .bind(&book.amazon_url)
        .bind(&book.author)
        .bind(&book.language)
        .bind(book.pages)
        .bind(&book.publisher)
        .bind(&book.title)
        .bind(book.year)
        .fetch_one(&self.pool)
        .await
        .map_err(|error| match error {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => RepositoryError::Conflict {
                isbn: book.isbn.clone(),
            },
            other => RepositoryError::Database(other),
        })
    }

    /// Replace every non-key field of an existing book.
    pub async fn update(&self, isbn: &str, fields: &BookUpdate) -> RepositoryResult<Book> {
        sqlx::query_as::<_, Book>(
            // language=sqlite
            r#"
            UPDATE books
            SET amazon_url = ?2, author = ?3, language = ?4, pages = ?5,
                publisher = ?6, title = ?7, year = ?8
            WHERE isbn = ?1
            RETURNING isbn, amazon_url, author, language, pages, publisher, title, year
            "#,
        )
        .bind(isbn)
        .bind(&fields.amazon_url)
        .bind(&fields.author)
        .bind(&fields.language)
        .bind(fields.pages)
        .bind(&fields.publisher)
        .bind(&fields.title)
        .bind(fields.year)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found(isbn))
    }

    pub async fn delete(&self, isbn: &str) -> RepositoryResult<()> {
        // language=sqlite
        let result = sqlx::query("DELETE FROM books WHERE isbn = ?1")
            .bind(isbn)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(not_found(isbn));
        }
        Ok(())
    }
}

fn not_found(isbn: &str) -> RepositoryError {
    RepositoryError::NotFound {
        isbn: isbn.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::books::migrations;
    use bookshelf_kernel::settings::DatabaseSettings;

    async fn repository() -> BookRepository {
        let pool = bookshelf_db::connect(&DatabaseSettings::in_memory())
            .await
            .unwrap();
        let migrations: Vec<_> = migrations()
            .into_iter()
            .map(|migration| ("books".to_string(), migration))
            .collect();
        bookshelf_db::migrate(&pool, &migrations).await.unwrap();
        BookRepository::new(pool)
    }

    fn power_up() -> Book {
        Book {
            isbn: "0691161518".to_string(),
            amazon_url: "http://a.co/eobPtX2".to_string(),
            author: "Matthew Lane".to_string(),
            language: "english".to_string(),
            pages: 264,
            publisher: "Princeton University Press".to_string(),
            title: "Power-Up: Unlocking the Hidden Mathematics in Video Games".to_string(),
            year: 2017,
        }
    }

    fn hiking() -> Book {
        Book {
            isbn: "1234567890".to_string(),
            amazon_url: "http://a.co/oplXtB5".to_string(),
            author: "Greta Vanwinkle".to_string(),
            language: "english".to_string(),
            pages: 700,
            publisher: "Clearing House".to_string(),
            title: "Hiking n Stuff".to_string(),
            year: 2005,
        }
    }

    fn fields_of(book: &Book) -> BookUpdate {
        BookUpdate {
            amazon_url: book.amazon_url.clone(),
            author: book.author.clone(),
            language: book.language.clone(),
            pages: book.pages,
            publisher: book.publisher.clone(),
            title: book.title.clone(),
            year: book.year,
        }
    }

    #[tokio::test]
    async fn create_then_get_returns_same_record() {
        let repo = repository().await;
        let created = repo.create(&power_up()).await.unwrap();
        assert_eq!(created, power_up());
        assert_eq!(repo.get_by_isbn("0691161518").await.unwrap(), power_up());
    }

    #[tokio::test]
    async fn list_all_is_ordered_by_title() {
        let repo = repository().await;
        repo.create(&power_up()).await.unwrap();
        repo.create(&hiking()).await.unwrap();

        let titles: Vec<String> = repo
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|book| book.title)
            .collect();
        assert_eq!(titles, vec![hiking().title, power_up().title]);
    }

    #[tokio::test]
    async fn count_tracks_creates_and_deletes() {
        let repo = repository().await;
        assert_eq!(repo.count().await.unwrap(), 0);

        repo.create(&power_up()).await.unwrap();
        repo.create(&hiking()).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);

        repo.delete("1234567890").await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_isbn_is_a_conflict() {
        let repo = repository().await;
        repo.create(&power_up()).await.unwrap();

        let err = repo.create(&power_up()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict { ref isbn } if isbn == "0691161518"));
    }

    #[tokio::test]
    async fn missing_isbn_is_not_found_everywhere() {
        let repo = repository().await;

        let get = repo.get_by_isbn("123").await.unwrap_err();
        let update = repo.update("123", &fields_of(&power_up())).await.unwrap_err();
        let delete = repo.delete("123").await.unwrap_err();

        for err in [get, update, delete] {
            assert!(matches!(err, RepositoryError::NotFound { .. }));
            assert_eq!(err.to_string(), "There is no book with an isbn 123");
        }
    }

    #[tokio::test]
    async fn update_replaces_fields_and_is_idempotent() {
        let repo = repository().await;
        repo.create(&power_up()).await.unwrap();

        let mut fields = fields_of(&power_up());
        fields.pages = 265;

        let first = repo.update("0691161518", &fields).await.unwrap();
        let second = repo.update("0691161518", &fields).await.unwrap();
        assert_eq!(first.pages, 265);
        assert_eq!(first, second);
        assert_eq!(repo.get_by_isbn("0691161518").await.unwrap(), second);
    }

    #[tokio::test]
    async fn delete_is_one_way() {
        let repo = repository().await;
        repo.create(&power_up()).await.unwrap();

        repo.delete("0691161518").await.unwrap();
        assert!(matches!(
            repo.get_by_isbn("0691161518").await,
            Err(RepositoryError::NotFound { .. })
        ));
        assert!(matches!(
            repo.delete("0691161518").await,
            Err(RepositoryError::NotFound { .. })
        ));
    }
}
