//! On-disk layout of a collection
//!
//! ```text
//! <output>/<collection>/
//!     jsons/                  one metadata record per page
//!     htmls/                  page snapshot per record
//!     pdfs/
//!     remaining_links.txt     copy of the seed file
//!     frontier.db             SQLite frontier
//!     frontier_state.json     in-memory frontier snapshot
//! ```

use crate::CrawlError;
use std::path::{Path, PathBuf};

/// Paths of one collection's output directory
#[derive(Debug, Clone)]
pub struct OutputLayout {
    collection_dir: PathBuf,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, collection: &str) -> Self {
        Self {
            collection_dir: output_dir.join(collection),
        }
    }

    /// Creates the collection directory and its subdirectories
    pub fn create(&self) -> std::io::Result<()> {
        for dir in [self.jsons_dir(), self.htmls_dir(), self.pdfs_dir()] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub fn collection_dir(&self) -> &Path {
        &self.collection_dir
    }

    pub fn jsons_dir(&self) -> PathBuf {
        self.collection_dir.join("jsons")
    }

    pub fn htmls_dir(&self) -> PathBuf {
        self.collection_dir.join("htmls")
    }

    pub fn pdfs_dir(&self) -> PathBuf {
        self.collection_dir.join("pdfs")
    }

    pub fn frontier_db(&self) -> PathBuf {
        self.collection_dir.join("frontier.db")
    }

    pub fn frontier_snapshot(&self) -> PathBuf {
        self.collection_dir.join("frontier_state.json")
    }

    pub fn remaining_links(&self) -> PathBuf {
        self.collection_dir.join("remaining_links.txt")
    }

    /// Copies the seed file into the collection and returns the copy's path
    ///
    /// When `links` does not exist, an earlier copy is reused so an
    /// interrupted collection can be resumed without the original file.
    pub fn prepare_seed_file(&self, links: &Path) -> Result<PathBuf, CrawlError> {
        let target = self.remaining_links();

        if links.exists() {
            std::fs::copy(links, &target).map_err(|source| CrawlError::Seeds {
                path: links.to_path_buf(),
                source,
            })?;
        } else if target.exists() {
            tracing::warn!(
                links = %links.display(),
                "Seed file not found, reusing {}",
                target.display()
            );
        } else {
            return Err(CrawlError::Seeds {
                path: links.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "seed file not found"),
            });
        }

        Ok(target)
    }
}

/// Reads newline-delimited seed URLs, trimmed, skipping blank lines
pub fn read_seeds(path: &Path) -> Result<Vec<String>, CrawlError> {
    let content = std::fs::read_to_string(path).map_err(|source| CrawlError::Seeds {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
