pub mod books;

use bookshelf_kernel::ModuleRegistry;
use sqlx::SqlitePool;

/// Register all application modules with the registry
pub fn register_all(registry: &mut ModuleRegistry, db: &SqlitePool) {
    registry.register(books::create_module(books::repository::BookRepository::new(
        db.clone(),
    )));
}
