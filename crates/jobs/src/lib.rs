//! Background job engine for the comic library: durable job records, typed tasks, and a
//! single-consumer worker.

pub mod config;
pub mod jobs;
pub mod library;
pub mod system;

pub use config::{ConfigError, JobSystemConfig, StoreBackend};
pub use library::{ComicLibrary, ComicLookup, ConvertOptions, ImportOptions, InMemoryComicCatalog};
pub use system::{JobSystem, StartError};

#[cfg(test)]
mod testing;
