//! Bookshelf application library
//!
//! Application modules mounted on the bookshelf kernel; the books module owns
//! the `/books` CRUD API.

pub mod modules;

pub use modules::*;
