use std::{borrow::Cow, sync::OnceLock};

use regex::{Captures, Regex};
use serde::Serialize;

use crate::loader::LoadedPost;

/// Body of `POST /v1/users/{id}/posts`.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PublishRequest {
    pub title: String,
    pub content_format: &'static str,
    pub content: String,
    pub canonical_url: String,
    pub tags: Vec<String>,
    /// Always a draft; going live is done by hand on Medium.
    pub publish_status: &'static str,
}

impl PublishRequest {
    pub fn build(post: &LoadedPost, site_url: &str) -> Self {
        let site_url = site_url.trim_end_matches('/');
        let body = absolutize_images(&post.meta.body, site_url);
        let content = match post.meta.img_src.as_deref() {
            Some(img_src) => format!(
                "![title img]({})\n\n{body}",
                absolute_url(&encode_image_path(img_src), site_url)
            ),
            None => body.into_owned(),
        };

        Self {
            title: post.meta.title.clone(),
            content_format: "markdown",
            content,
            canonical_url: format!("{site_url}{}", post.id.slug()),
            tags: post.meta.tags.clone(),
            publish_status: "draft",
        }
    }
}

// "ﾂｷ" is how `·` ends up in file names after a Shift_JIS round trip
fn encode_image_path(img_src: &str) -> String {
    img_src.trim().replace(' ', "%20").replace("ﾂｷ", "·")
}

fn absolute_url(path: &str, site_url: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        path.to_string()
    } else {
        format!("{site_url}/{}", path.trim_start_matches('/'))
    }
}

/// Points root-relative image references (`![alt](/imgs/...)`) at the live site.
fn absolutize_images<'a>(body: &'a str, site_url: &str) -> Cow<'a, str> {
    static IMAGE_PATTERN: OnceLock<Regex> = OnceLock::new();
    let image_pattern = IMAGE_PATTERN
        .get_or_init(|| Regex::new(r"(!\[[^\]]*\]\()(/[^/)\s][^)\s]*)").unwrap());

    image_pattern.replace_all(body, |caps: &Captures| {
        format!("{}{site_url}{}", &caps[1], &caps[2])
    })
}
