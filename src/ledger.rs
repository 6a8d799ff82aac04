use std::{
    collections::HashSet,
    fs::{File, OpenOptions},
    io::{BufRead, BufReader, BufWriter, Write},
    path::Path,
};

use anyhow::Context;
use log::{debug, info};

use crate::identifier::ArticleId;

/// Identifiers of articles already submitted, in the order they were recorded.
#[derive(Debug, Default, Clone)]
pub(crate) struct Ledger {
    entries: Vec<ArticleId>,
    index: HashSet<ArticleId>,
}

impl Ledger {
    /// Reads one identifier per line. A missing file is a first run, not an error.
    ///
    /// Entries are normalized on the way in, so ledgers written with backslashes or as
    /// full URLs under `url_prefix` compare equal to freshly scanned posts.
    pub fn load(path: &Path, url_prefix: &str) -> anyhow::Result<Self> {
        let mut ledger = Self::default();
        if !path.exists() {
            info!("Ledger file({path:?}) does not exist. starting empty...");
            return Ok(ledger);
        }

        let fd = File::open(path).with_context(|| format!("while opening {path:?}"))?;
        for line in BufReader::new(fd).lines() {
            let line = line.with_context(|| format!("while reading {path:?}"))?;
            if line.trim().is_empty() {
                continue;
            }
            let id = ArticleId::normalize(&line, url_prefix);
            if !ledger.insert(id.clone()) {
                debug!("dropping duplicated ledger entry {id}");
            }
        }

        Ok(ledger)
    }

    /// Overwrites `path` with the whole ledger.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let fd = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(fd);
        for id in self.entries.iter() {
            writeln!(writer, "{id}")?;
        }
        writer.flush()?;

        Ok(())
    }

    pub fn contains(&self, id: &ArticleId) -> bool {
        self.index.contains(id)
    }

    /// Returns `false` if `id` was already recorded.
    pub fn insert(&mut self, id: ArticleId) -> bool {
        if !self.index.insert(id.clone()) {
            return false;
        }
        self.entries.push(id);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = "https://friendlyuser.github.io";

    fn id(s: &str) -> ArticleId {
        ArticleId::normalize(s, "")
    }

    #[test]
    fn missing_file_is_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Ledger::load(&dir.path().join("nope.txt"), SITE).unwrap();
        assert_eq!(ledger.len(), 0);
    }

    #[test]
    fn load_normalizes_and_drops_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("medium_articles.txt");
        std::fs::write(
            &path,
            concat!(
                "\\posts\\tech\\foo.md\n",
                "  /posts/tech/foo.md  \n",
                "\n",
                "https://friendlyuser.github.io/posts/web/bar.md\r\n",
            ),
        )
        .unwrap();

        let ledger = Ledger::load(&path, SITE).unwrap();
        assert_eq!(ledger.len(), 2);
        assert!(ledger.contains(&id("/posts/tech/foo.md")));
        assert!(ledger.contains(&id("/posts/web/bar.md")));
    }

    #[test]
    fn save_overwrites_in_insertion_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scripts").join("medium_articles.txt");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let stale = "/stale/entry/that/is/much/longer/than/the/new/content.md\n";
        std::fs::write(&path, stale).unwrap();

        let mut ledger = Ledger::default();
        assert!(ledger.insert(id("/b.md")));
        assert!(ledger.insert(id("/a.md")));
        assert!(!ledger.insert(id("\\b.md")));
        ledger.save(&path).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "/b.md\n/a.md\n");
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.txt");

        let mut ledger = Ledger::default();
        ledger.insert(id("/posts/x.md"));
        ledger.save(&path).unwrap();

        let reloaded = Ledger::load(&path, SITE).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains(&id("/posts/x.md")));
    }
}
