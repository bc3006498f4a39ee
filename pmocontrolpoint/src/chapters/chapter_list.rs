//! `<result><chapterList>` chapter indexes: offsets are `H:MM:SS[.mmm]` time codes.

use pmodidl::ContentObject;

use super::{ChapterFetcher, ChapterList, HttpFetcher, claimed_url, collect_offsets, texts_at_path};
use crate::errors::ControlPointError;
use crate::time_utils::parse_hms_to_ms;

/// Default claim tag: `pv:chapterInfo` attribute of a `res` entry.
pub const CHAPTER_LIST_TAG: &str = "res@pv:chapterInfo";

const TIME_CODE_PATH: &[&str] = &["result", "chapterList", "item", "timeCode"];

pub fn parse_chapter_list(xml: &str) -> Result<ChapterList, ControlPointError> {
    let texts = texts_at_path(xml, TIME_CODE_PATH)?;
    Ok(collect_offsets("chapterList", texts, parse_hms_to_ms))
}

pub struct ChapterListFetcher {
    tag_path: String,
}

impl Default for ChapterListFetcher {
    fn default() -> Self {
        Self::new(CHAPTER_LIST_TAG)
    }
}

impl ChapterListFetcher {
    pub fn new(tag_path: impl Into<String>) -> Self {
        Self {
            tag_path: tag_path.into(),
        }
    }
}

impl ChapterFetcher for ChapterListFetcher {
    fn name(&self) -> &str {
        "chapterList"
    }

    fn claim(&self, object: &ContentObject) -> Option<String> {
        claimed_url(object, &self.tag_path)
    }

    fn fetch(&self, url: &str, http: &dyn HttpFetcher) -> Result<ChapterList, ControlPointError> {
        parse_chapter_list(&http.get_text(url)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_codes() {
        let xml = r#"<result>
            <chapterList>
              <item><title>Intro</title><timeCode>0:00:00.000</timeCode></item>
              <item><timeCode>0:03:12.250</timeCode></item>
              <item><timeCode>not a time</timeCode></item>
              <item><timeCode>1:00:00</timeCode></item>
            </chapterList>
        </result>"#;
        assert_eq!(
            parse_chapter_list(xml).unwrap(),
            vec![0, 192_250, 3_600_000]
        );
    }

    #[test]
    fn test_overflowing_time_code_is_skipped() {
        let xml = "<result><chapterList>\
            <item><timeCode>0:00:01</timeCode></item>\
            <item><timeCode>9999999999999999:00:00</timeCode></item>\
            </chapterList></result>";
        assert_eq!(parse_chapter_list(xml).unwrap(), vec![1000]);
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(parse_chapter_list("<result><chapterList><item>").is_err());
    }
}
