//! Ports onto the rest of the comic library.
//!
//! The job engine never touches archives or the catalog directly. Decoders resolve
//! subjects through [`ComicLookup`]; task bodies do their work through [`ComicLibrary`].

use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use comicshelf_core::{ArchiveType, Comic, ComicId, DomainResult};

/// Resolves comic references embedded in job records.
pub trait ComicLookup: Send + Sync {
    /// `Ok(None)` when no comic has this id.
    fn find_comic(&self, id: ComicId) -> DomainResult<Option<Comic>>;
}

/// Options shared by import and reprocessing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImportOptions {
    /// Drop pages whose hash is on the blocked list.
    pub delete_blocked_pages: bool,
    /// Skip embedded metadata (ComicInfo.xml and friends).
    pub ignore_metadata: bool,
}

/// Options for repacking an archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConvertOptions {
    /// Rename pages to a zero-padded sequence while repacking.
    pub rename_pages: bool,
    /// Leave out pages marked deleted.
    pub delete_pages: bool,
}

/// Format and filesystem adaptor used from inside task bodies.
///
/// Errors are opaque to the job engine; they surface as execution failures.
pub trait ComicLibrary: Send + Sync {
    /// Import a new archive and return the id assigned to it.
    fn import(&self, filename: &Path, options: ImportOptions) -> anyhow::Result<ComicId>;

    fn process(&self, comic: &Comic, options: ImportOptions) -> anyhow::Result<()>;

    fn convert(
        &self,
        comic: &Comic,
        target: ArchiveType,
        options: ConvertOptions,
    ) -> anyhow::Result<()>;

    /// Move the archive under `target_directory`, naming it with `renaming_rule`
    /// (empty keeps the current file name).
    fn relocate(
        &self,
        comic: &Comic,
        target_directory: &Path,
        renaming_rule: &str,
    ) -> anyhow::Result<()>;

    fn delete(&self, comic: &Comic, delete_file: bool) -> anyhow::Result<()>;

    fn rescan(&self, comic: &Comic) -> anyhow::Result<()>;

    fn undelete(&self, comic: &Comic) -> anyhow::Result<()>;
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryComicCatalog {
    comics: RwLock<HashMap<ComicId, Comic>>,
}

impl InMemoryComicCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comics(comics: impl IntoIterator<Item = Comic>) -> Self {
        let catalog = Self::new();
        for comic in comics {
            catalog.insert(comic);
        }
        catalog
    }

    pub fn insert(&self, comic: Comic) {
        let mut comics = self.comics.write().unwrap_or_else(PoisonError::into_inner);
        comics.insert(comic.id, comic);
    }
}

impl ComicLookup for InMemoryComicCatalog {
    fn find_comic(&self, id: ComicId) -> DomainResult<Option<Comic>> {
        let comics = self.comics.read().unwrap_or_else(PoisonError::into_inner);
        Ok(comics.get(&id).cloned())
    }
}
