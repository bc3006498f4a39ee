//! `<contentInfo>` chapter indexes: offsets are float seconds.
//!
//! ```xml
//! <contentInfo>
//!   <content_chapter_info>
//!     <chapter><chapter_point>12.5</chapter_point></chapter>
//!   </content_chapter_info>
//! </contentInfo>
//! ```

use pmodidl::ContentObject;

use super::{ChapterFetcher, ChapterList, HttpFetcher, claimed_url, collect_offsets, texts_at_path};
use crate::errors::ControlPointError;
use crate::time_utils::parse_seconds_to_ms;

/// Default claim tag: `av:chapterInfo` attribute of a `res` entry.
pub const CONTENT_INFO_TAG: &str = "res@av:chapterInfo";

const CHAPTER_POINT_PATH: &[&str] = &[
    "contentInfo",
    "content_chapter_info",
    "chapter",
    "chapter_point",
];

pub fn parse_content_info(xml: &str) -> Result<ChapterList, ControlPointError> {
    let texts = texts_at_path(xml, CHAPTER_POINT_PATH)?;
    Ok(collect_offsets("contentInfo", texts, parse_seconds_to_ms))
}

pub struct ContentInfoFetcher {
    tag_path: String,
}

impl Default for ContentInfoFetcher {
    fn default() -> Self {
        Self::new(CONTENT_INFO_TAG)
    }
}

impl ContentInfoFetcher {
    /// `tag_path` uses the `tag@attribute` syntax of [`ContentObject::value`].
    pub fn new(tag_path: impl Into<String>) -> Self {
        Self {
            tag_path: tag_path.into(),
        }
    }
}

impl ChapterFetcher for ContentInfoFetcher {
    fn name(&self) -> &str {
        "contentInfo"
    }

    fn claim(&self, object: &ContentObject) -> Option<String> {
        claimed_url(object, &self.tag_path)
    }

    fn fetch(&self, url: &str, http: &dyn HttpFetcher) -> Result<ChapterList, ControlPointError> {
        parse_content_info(&http.get_text(url)?)
    }
}
