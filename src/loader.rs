use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::Context;
use log::{debug, warn};
use regex::{Regex, RegexBuilder};

use crate::identifier::ArticleId;

mod data;

pub(crate) use data::{LoadedPost, PostMetadata};
use data::FrontMatter;

const POST_EXTENSION: &str = "md";

/// Lazily loads every post directly inside `root/dir` for each of `dirs`.
///
/// One malformed file yields one `Err` item; the scan goes on.
pub(crate) fn scan<'a>(
    root: &'a Path,
    dirs: &'a [PathBuf],
) -> impl Iterator<Item = anyhow::Result<LoadedPost>> + 'a {
    dirs.iter()
        .flat_map(move |dir| post_files(&root.join(dir)))
        .map(move |path| load_post(root, path))
}

fn post_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot read post directory {dir:?}: {e}. skipping...");
            return vec![];
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().map_or(false, |ext| ext == POST_EXTENSION))
        .collect();
    files.sort();
    debug!("{} posts in {dir:?}", files.len());

    files
}

fn load_post(root: &Path, path: PathBuf) -> anyhow::Result<LoadedPost> {
    let bytes = std::fs::read(&path).with_context(|| format!("while reading {path:?}"))?;
    // invalid UTF-8 is replaced, not fatal
    let content = String::from_utf8_lossy(&bytes);
    let meta = parse_post(&content).with_context(|| format!("while preprocessing {path:?}"))?;
    let id = ArticleId::from_post_path(root, &path);

    Ok(LoadedPost { path, id, meta })
}

/// Splits a post into its YAML front matter and markdown body.
pub(crate) fn parse_post(content: &str) -> anyhow::Result<PostMetadata> {
    static HEADER_PATTERN: OnceLock<Regex> = OnceLock::new();
    let header_pattern = HEADER_PATTERN.get_or_init(|| {
        RegexBuilder::new(r"\A\x{FEFF}?---[ \t]*\r?\n(.*?)\r?\n---[ \t]*(?:\r?\n|\z)(.*)")
            .dot_matches_new_line(true)
            .build()
            .unwrap()
    });

    let caps = header_pattern
        .captures(content)
        .context("front matter block (---) not found")?;
    let header: FrontMatter = serde_yaml::from_str(&caps[1]).context("Invalid front matter")?;
    let body = caps.get(2).map_or("", |m| m.as_str());

    Ok(PostMetadata {
        title: header.title,
        tags: header.tags,
        img_src: header.img_src.filter(|s| !s.trim().is_empty()),
        pub_date: header.pub_date.filter(|s| !s.trim().is_empty()),
        body: body.to_string(),
    })
}
