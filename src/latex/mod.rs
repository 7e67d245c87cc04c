//! LaTeX expansion for `<latex-pic>` elements.
//!
//! Authors write formulas inline:
//!
//! ```html
//! <latex-pic>e^{i\pi} + 1 = 0</latex-pic>
//! ```
//!
//! [`expand`] renders each element's text through a [`LatexBackend`] and
//! replaces the element with an `<img>` carrying the PNG as a data URI, the
//! source text doubling as `alt` and `title`. An element whose conversion
//! fails is left in place; the remaining elements are still converted and the
//! failures are reported together.
//!
//! - **Backend**: [`LatexBackend`] trait + [`Tex2Im`]
//! - **Expansion**: elements are found in the parsed tree, so comments, script
//!   text and lookalike tags such as `<latex-pic-note>` are never converted.
//!   A document with at least one replacement is re-serialized from the tree.

pub mod backend;
pub mod tex2im;

pub use backend::{LatexBackend, LatexError};
pub use tex2im::Tex2Im;

use crate::html::Document;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use scraper::{Html, Node, Selector};
use std::fmt;
use std::sync::LazyLock;

static LATEX_PIC: LazyLock<Selector> = LazyLock::new(|| Selector::parse("latex-pic").unwrap());
static IMG: LazyLock<Selector> = LazyLock::new(|| Selector::parse("img").unwrap());

/// One element that could not be converted.
#[derive(Debug)]
pub struct LatexFailure {
    pub tex: String,
    pub error: LatexError,
}

/// Every conversion failure within one document.
#[derive(Debug)]
pub struct ExpandError {
    pub failures: Vec<LatexFailure>,
}

impl fmt::Display for ExpandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} LaTeX element(s) not converted", self.failures.len())?;
        for failure in &self.failures {
            write!(f, "; {:?}: {}", failure.tex, failure.error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExpandError {}

/// Replace `<latex-pic>` elements in `document` with rendered images.
pub fn expand(document: &mut Document, backend: &impl LatexBackend) -> Result<(), ExpandError> {
    let (markup, failures) = expand_markup(&document.markup, backend);
    document.markup = markup;
    if failures.is_empty() {
        Ok(())
    } else {
        Err(ExpandError { failures })
    }
}

fn expand_markup(markup: &str, backend: &impl LatexBackend) -> (String, Vec<LatexFailure>) {
    let mut html = Html::parse_document(markup);
    let targets: Vec<_> = html
        .select(&LATEX_PIC)
        .map(|el| (el.id(), el.text().collect::<String>()))
        .collect();

    let mut failures = Vec::new();
    let mut replaced = 0;
    for (id, tex) in targets {
        let rendered = if tex.trim().is_empty() {
            Err(LatexError::EmptySource)
        } else {
            backend.render(&tex)
        };
        let png = match rendered {
            Ok(png) => png,
            Err(error) => {
                failures.push(LatexFailure { tex, error });
                continue;
            }
        };
        let fragment = Html::parse_fragment(&img_tag(&png, &tex));
        let Some(img) = fragment.select(&IMG).next() else {
            continue;
        };
        if let Some(mut target) = html.tree.get_mut(id) {
            target.insert_before(Node::Element(img.value().clone()));
            target.detach();
            replaced += 1;
        }
    }

    // Untouched documents keep their source text byte for byte.
    if replaced == 0 {
        return (markup.to_string(), failures);
    }
    (html.html(), failures)
}

fn img_tag(png: &[u8], tex: &str) -> String {
    let alt = escape_attr(tex);
    format!(
        r#"<img src="data:image/png;base64,{}" alt="{alt}" title="{alt}">"#,
        STANDARD.encode(png)
    )
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
