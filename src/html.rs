//! Content parsing and fragment extraction for HTML sources.
//!
//! Content files are complete HTML documents. The parts the build cares about:
//!
//! - `<title>`: the entry title (text of every title element, concatenated)
//! - `<meta name="created" value="...">`: the creation timestamp
//! - `<body>`: the fragment rendered into templates
//!
//! A document without a usable creation timestamp gets one minted from the
//! current time. [`load_saved`] writes the stamped document back to the
//! source so the date is stable across builds.
//!
//! Shared include files (`inc/header.html` etc.) are read with
//! [`extract_element`], which returns the inner HTML of a named element along
//! with the file's modification time for staleness checks.

use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, SubsecRound};
use scraper::{Html, Selector};
use std::borrow::Cow;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use std::time::SystemTime;
use thiserror::Error;
use tracing::warn;

/// Format written into minted `created` meta elements.
pub const CREATED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
/// Accepted on read; interpreted as UTC.
const CREATED_FORMAT_NO_TZ: &str = "%Y-%m-%dT%H:%M:%S";

static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static META: LazyLock<Selector> = LazyLock::new(|| Selector::parse("meta").unwrap());
static BODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("body").unwrap());

#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid element name: {0:?}")]
    InvalidElement(String),
}

/// A parsed content file.
#[derive(Debug, Clone)]
pub struct Document {
    /// Full document markup, including a minted `created` meta if one was added.
    pub markup: String,
    pub title: String,
    pub created: DateTime<FixedOffset>,
    /// Modification time of the source.
    pub updated: DateTime<FixedOffset>,
}

impl Document {
    /// Inner HTML of the `<body>` element.
    pub fn body(&self) -> String {
        let parsed = Html::parse_document(&self.markup);
        parsed.select(&BODY).map(|el| el.inner_html()).collect()
    }
}

/// Parse a content file.
///
/// The returned flag is true when the creation timestamp was minted, in which
/// case `markup` differs from the file on disk.
pub fn load(path: &Path) -> Result<(Document, bool), HtmlError> {
    let (document, stamped) = parse(path)?;
    Ok((document, stamped.is_some()))
}

/// Parse a content file, persisting a minted creation timestamp to the source.
pub fn load_saved(path: &Path) -> Result<Document, HtmlError> {
    let (mut document, stamped) = parse(path)?;
    if let Some(source) = stamped {
        fs::write(path, source)?;
        document.updated = local_time(fs::metadata(path)?.modified()?);
    }
    Ok(document)
}

/// Inner HTML of every `element` in the file, plus the file's mtime.
pub fn extract_element(path: &Path, element: &str) -> Result<(String, SystemTime), HtmlError> {
    let selector =
        Selector::parse(element).map_err(|_| HtmlError::InvalidElement(element.to_string()))?;
    let (markup, modified) = read_raw(path)?;
    let parsed = Html::parse_document(&markup);
    let fragment = parsed.select(&selector).map(|el| el.inner_html()).collect();
    Ok((fragment, modified))
}

/// Raw file contents plus mtime, for includes that are not HTML.
pub fn read_raw(path: &Path) -> Result<(String, SystemTime), HtmlError> {
    let source = fs::read(path)?;
    let modified = fs::metadata(path)?.modified()?;
    Ok((decode(path, &source).into_owned(), modified))
}

/// The parsed document, plus the stamped source bytes when a timestamp was
/// minted. Stamping works on the raw bytes, so saving never rewrites bytes
/// that failed to decode.
fn parse(path: &Path) -> Result<(Document, Option<Vec<u8>>), HtmlError> {
    let source = fs::read(path)?;
    let modified = fs::metadata(path)?.modified()?;
    let markup = decode(path, &source).into_owned();

    let parsed = Html::parse_document(&markup);
    let title: String = parsed.select(&TITLE).flat_map(|el| el.text()).collect();
    let declared = parsed
        .select(&META)
        .filter(|el| el.value().attr("name") == Some("created"))
        .filter_map(|el| el.value().attr("value"))
        .find_map(parse_created);

    let (markup, created, stamped) = match declared {
        Some(created) => (markup, created, None),
        None => {
            let now = Local::now().fixed_offset().trunc_subsecs(0);
            let stamped = insert_created_meta(&source, &now);
            let markup = String::from_utf8_lossy(&stamped).into_owned();
            (markup, now, Some(stamped))
        }
    };

    let document = Document {
        markup,
        title,
        created,
        updated: local_time(modified),
    };
    Ok((document, stamped))
}

/// Invalid UTF-8 is replaced with U+FFFD instead of failing the file.
fn decode<'a>(path: &Path, source: &'a [u8]) -> Cow<'a, str> {
    let text = String::from_utf8_lossy(source);
    if matches!(text, Cow::Owned(_)) {
        warn!(path = %path.display(), "not valid UTF-8, undecodable bytes replaced");
    }
    text
}

fn parse_created(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    DateTime::parse_from_str(value, CREATED_FORMAT)
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, CREATED_FORMAT_NO_TZ)
                .ok()
                .map(|naive| naive.and_utc().fixed_offset())
        })
}

fn local_time(time: SystemTime) -> DateTime<FixedOffset> {
    DateTime::<Local>::from(time).fixed_offset()
}

/// Add a `created` meta element to the document head.
///
/// Works on the source bytes so the rest of the document is left untouched.
fn insert_created_meta(source: &[u8], created: &DateTime<FixedOffset>) -> Vec<u8> {
    let meta = format!(
        r#"<meta value="{}" name="created">"#,
        created.format(CREATED_FORMAT)
    );
    let lower = source.to_ascii_lowercase();
    let (at, insert) = if let Some((start, _)) = find_tag(&lower, b"</head") {
        (start, meta)
    } else if let Some((_, end)) = find_tag(&lower, b"<head") {
        (end, meta)
    } else if let Some((_, end)) = find_tag(&lower, b"<html") {
        (end, format!("<head>{meta}</head>"))
    } else {
        (0, meta)
    };
    let mut out = Vec::with_capacity(source.len() + insert.len());
    out.extend_from_slice(&source[..at]);
    out.extend_from_slice(insert.as_bytes());
    out.extend_from_slice(&source[at..]);
    out
}

/// Byte range of the first tag named exactly `tag` (`<head` does not match
/// `<header>`). `lower` must already be ASCII-lowercased.
fn find_tag(lower: &[u8], tag: &[u8]) -> Option<(usize, usize)> {
    let mut from = 0;
    while let Some(offset) = lower[from..].windows(tag.len()).position(|w| w == tag) {
        let start = from + offset;
        let after = start + tag.len();
        match lower.get(after) {
            Some(b'>') => return Some((start, after + 1)),
            Some(b) if b.is_ascii_whitespace() || *b == b'/' => {
                let close = lower[after..].iter().position(|&b| b == b'>');
                return close.map(|i| (start, after + i + 1));
            }
            _ => from = after,
        }
    }
    None
}
