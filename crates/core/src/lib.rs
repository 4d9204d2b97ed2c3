//! `comicshelf-core`: library domain building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod comic;
pub mod error;
pub mod id;

pub use comic::{ArchiveType, Comic};
pub use error::{DomainError, DomainResult};
pub use id::ComicId;
