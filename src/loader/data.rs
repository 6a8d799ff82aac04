use serde::Deserialize;
use std::path::PathBuf;

use crate::identifier::ArticleId;

/// YAML header of a post. Unknown keys (`layout`, `description`, ...) are ignored.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(super) struct FrontMatter {
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub img_src: Option<String>,
    pub pub_date: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct PostMetadata {
    pub title: String,
    pub tags: Vec<String>,
    pub img_src: Option<String>,
    /// Raw value; parsed when deciding eligibility so a bad date never hides the post.
    pub pub_date: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub(crate) struct LoadedPost {
    pub path: PathBuf,
    pub id: ArticleId,
    pub meta: PostMetadata,
}
