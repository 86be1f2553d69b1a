//! Append-only archive of defective movies.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use crate::services::MovieItem;

/// Human-readable defect log.
///
/// Created with a header on the first record; entries are appended and never
/// rewritten or deduplicated, so reprocessing the same movie can produce
/// duplicate entries.
pub struct DefectArchive {
    path: PathBuf,
}

impl DefectArchive {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one defective movie, creating the file with its header first
    /// when absent.
    pub fn record(&self, movie: &MovieItem) -> Result<()> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).context("Failed to create archive directory")?;
                }
            }
            let header = format!(
                "=== Defective Movies ===\nCreated: {}\n\n",
                Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            fs::write(&self.path, header).context("Failed to create defect archive")?;
        }

        let display_name = match movie.year {
            Some(year) => format!("{} ({})", movie.name, year),
            None => movie.name.clone(),
        };

        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .context("Failed to open defect archive")?;
        writeln!(file, "- {display_name}")?;
        writeln!(file, "  {}", movie.path)?;
        writeln!(file)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn movie(name: &str, year: Option<i32>) -> MovieItem {
        MovieItem {
            id: "id".to_string(),
            name: name.to_string(),
            path: format!("/movies/{name}.mkv"),
            year,
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempdir().unwrap();
        let archive = DefectArchive::new(dir.path().join("defects.txt"));

        archive.record(&movie("Alien", Some(1979))).unwrap();
        archive.record(&movie("Solaris", Some(1972))).unwrap();

        let contents = fs::read_to_string(archive.path()).unwrap();
        assert_eq!(contents.matches("=== Defective Movies ===").count(), 1);
        assert!(contents.contains("Created: "));
        assert!(contents.contains("- Alien (1979)\n  /movies/Alien.mkv\n"));
        assert!(contents.contains("- Solaris (1972)\n  /movies/Solaris.mkv\n"));
    }

    #[test]
    fn test_year_segment_omitted_when_absent() {
        let dir = tempdir().unwrap();
        let archive = DefectArchive::new(dir.path().join("defects.txt"));

        archive.record(&movie("Stalker", None)).unwrap();

        let contents = fs::read_to_string(archive.path()).unwrap();
        assert!(contents.contains("- Stalker\n  /movies/Stalker.mkv\n"));
        assert!(!contents.contains("Stalker ("));
    }

    #[test]
    fn test_duplicate_entries_are_kept() {
        let dir = tempdir().unwrap();
        let archive = DefectArchive::new(dir.path().join("defects.txt"));

        archive.record(&movie("Alien", Some(1979))).unwrap();
        archive.record(&movie("Alien", Some(1979))).unwrap();

        let contents = fs::read_to_string(archive.path()).unwrap();
        assert_eq!(contents.matches("- Alien (1979)").count(), 2);
    }
}
