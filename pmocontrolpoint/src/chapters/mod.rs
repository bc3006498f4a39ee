//! Chapter markers fetched from vendor-specific chapter indexes.
//!
//! Each [`ChapterFetcher`] claims an object when its chapter-URL tag is
//! present and non-empty, then fetches and parses the vendor XML. The
//! [`ChapterFetchChain`] tries fetchers in registration order; the first
//! claim wins. Failures always resolve to an empty list.

mod chapter_list;
mod content_info;
mod http;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, bounded};
use pmoconfig::Config;
use pmodidl::ContentObject;
use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::{debug, warn};

use crate::errors::ControlPointError;

pub use chapter_list::{CHAPTER_LIST_TAG, ChapterListFetcher, parse_chapter_list};
pub use content_info::{CONTENT_INFO_TAG, ContentInfoFetcher, parse_content_info};
pub use http::{HttpFetcher, UreqFetcher};

/// Chapter start offsets in milliseconds, in document order.
pub type ChapterList = Vec<u64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOptions {
    pub fetch_timeout: Duration,
}

impl Default for ChapterOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

impl ChapterOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            fetch_timeout: config
                .get_chapter_fetch_timeout_secs()
                .map(|s| Duration::from_secs(s.max(1) as u64))
                .unwrap_or_else(|_| Self::default().fetch_timeout),
        }
    }
}

/// One vendor: how to recognise its objects and how to read its index.
pub trait ChapterFetcher: Send + Sync {
    fn name(&self) -> &str;

    /// Chapter index URL when this vendor handles `object`.
    fn claim(&self, object: &ContentObject) -> Option<String>;

    /// Fetches and parses the index at `url`. Malformed chapters are skipped;
    /// only transport or document-level failures are errors.
    fn fetch(&self, url: &str, http: &dyn HttpFetcher) -> Result<ChapterList, ControlPointError>;
}

/// Value of the claim tag when present and non-blank.
pub(crate) fn claimed_url(object: &ContentObject, tag_path: &str) -> Option<String> {
    object
        .value(tag_path)
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

/// Texte de chaque élément situé exactement au chemin `path` depuis la racine.
pub(crate) fn texts_at_path(xml: &str, path: &[&str]) -> Result<Vec<String>, ControlPointError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<String> = None;
    let mut texts = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                stack.push(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
                if stack.len() == path.len() && stack.iter().zip(path).all(|(a, b)| a == b) {
                    current = Some(String::new());
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                let depth = stack.len() + 1;
                if depth == path.len()
                    && stack.iter().zip(path).all(|(a, b)| a == b)
                    && path.last() == Some(&name.as_str())
                {
                    texts.push(String::new());
                }
            }
            Event::Text(e) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.decode().map_err(quick_xml::Error::Encoding)?);
                }
            }
            Event::CData(e) => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&e.decode().map_err(quick_xml::Error::Encoding)?);
                }
            }
            Event::End(_) => {
                if stack.len() == path.len() {
                    if let Some(text) = current.take() {
                        texts.push(text.trim().to_string());
                    }
                }
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ControlPointError::Xml(format!(
            "document ended inside <{}>",
            stack.join("/")
        )));
    }
    Ok(texts)
}

/// Parses every text with `parse`, skipping (and logging) malformed entries.
pub(crate) fn collect_offsets<F>(vendor: &str, texts: Vec<String>, parse: F) -> ChapterList
where
    F: Fn(&str) -> Result<u64, ControlPointError>,
{
    texts
        .into_iter()
        .filter_map(|text| match parse(&text) {
            Ok(ms) => Some(ms),
            Err(err) => {
                debug!(vendor, entry = text.as_str(), error = %err, "Skipping malformed chapter");
                None
            }
        })
        .collect()
}

/// Ordered list of vendor fetchers sharing one HTTP client.
#[derive(Clone)]
pub struct ChapterFetchChain {
    fetchers: Vec<Arc<dyn ChapterFetcher>>,
    http: Arc<dyn HttpFetcher>,
}

impl ChapterFetchChain {
    /// Empty chain; every object resolves to no chapters.
    pub fn new(http: Arc<dyn HttpFetcher>) -> Self {
        Self {
            fetchers: Vec::new(),
            http,
        }
    }

    /// Chain with the bundled vendors, over a `ureq` client.
    pub fn with_default_fetchers(options: &ChapterOptions) -> Self {
        let http: Arc<dyn HttpFetcher> = Arc::new(UreqFetcher::new(options.fetch_timeout));
        let mut chain = Self::new(http);
        chain.register(Arc::new(ContentInfoFetcher::default()));
        chain.register(Arc::new(ChapterListFetcher::default()));
        chain
    }

    /// Appends a fetcher at the lowest priority.
    pub fn register(&mut self, fetcher: Arc<dyn ChapterFetcher>) {
        self.fetchers.push(fetcher);
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Chapter offsets of `object`; empty when unclaimed or on any failure.
    pub fn resolve(&self, object: &ContentObject) -> ChapterList {
        for fetcher in &self.fetchers {
            let Some(url) = fetcher.claim(object) else {
                continue;
            };
            debug!(
                vendor = fetcher.name(),
                object = object.id.as_str(),
                url = url.as_str(),
                "Chapter index claimed"
            );
            return match fetcher.fetch(&url, self.http.as_ref()) {
                Ok(chapters) => chapters,
                Err(err) => {
                    warn!(
                        vendor = fetcher.name(),
                        url = url.as_str(),
                        error = %err,
                        "Chapter fetch failed"
                    );
                    Vec::new()
                }
            };
        }
        Vec::new()
    }

    /// Runs [`resolve`](Self::resolve) on its own thread.
    pub fn spawn_resolve(&self, object: ContentObject) -> Receiver<ChapterList> {
        let (tx, rx) = bounded(1);
        let chain = self.clone();
        let worker_tx = tx.clone();
        let spawned = thread::Builder::new()
            .name("chapter-fetch".into())
            .spawn(move || {
                let _ = worker_tx.send(chain.resolve(&object));
            });
        if let Err(err) = spawned {
            warn!(error = %err, "Cannot spawn chapter fetch thread");
            let _ = tx.send(Vec::new());
        }
        rx
    }
}
