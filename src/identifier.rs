use std::{fmt, path::Path};

/// Ledger key of a post: forward-slash path relative to the post root, with a single leading `/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ArticleId(String);

impl ArticleId {
    /// Normalizes `raw` and strips `prefix` from it. The prefix may be a directory
    /// (`src/pages`) or the site URL, for ledger entries recorded as full URLs.
    pub fn normalize(raw: &str, prefix: &str) -> Self {
        let path = unify_separators(raw);
        let prefix = unify_separators(prefix);
        let path = strip_dir_prefix(&path, prefix.trim_end_matches('/'));

        Self(format!("/{}", path.trim_start_matches('/')))
    }

    pub fn from_post_path(root: &Path, path: &Path) -> Self {
        let relative = path.strip_prefix(root).unwrap_or(path);
        Self::normalize(&relative.to_string_lossy(), "")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identifier without its `.md` extension, used to build canonical URLs.
    pub fn slug(&self) -> &str {
        self.0.strip_suffix(".md").unwrap_or(&self.0)
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn unify_separators(s: &str) -> String {
    let s = s.trim().replace('\\', "/");
    match s.strip_prefix("./") {
        Some(rest) => rest.to_string(),
        None => s,
    }
}

// only strips on a segment boundary: `src/pages` must not eat `src/pages2/a.md`
fn strip_dir_prefix<'a>(path: &'a str, prefix: &str) -> &'a str {
    if prefix.is_empty() {
        return path;
    }
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => path,
    }
}
