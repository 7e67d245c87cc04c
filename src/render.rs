//! Template rendering.
//!
//! Templates are [minijinja](https://docs.rs/minijinja) files under
//! `<root>/tpl/`, loaded by name at render time:
//!
//! | Template | Output | Entries |
//! |---|---|---|
//! | `entry.html` | one page per content file | the single entry, with body |
//! | `archive.html` | `<archive>/index.html` | all, without bodies |
//! | `index.html` | `<main>/index.html` | latest window, with bodies |
//! | `index.atom` | `<feed>/index.atom` | latest window, with bodies |
//!
//! Every template receives a [`TemplateData`]. Fragments (`header`,
//! `titlebar`, `footer`, entry bodies) are already HTML, so auto-escaping is
//! off.
//!
//! ## Filters
//!
//! - `trunc10`: `2024-06-01`
//! - `rfc3339`: `2024-06-01T09:30:00Z`
//! - `datediff`: archive table cells that print the year and month only when
//!   they change from the previous call. State resets at the start of every
//!   render.

use crate::config::SiteConfig;
use crate::entry::Entry;
use crate::html::{self, HtmlError};
use crate::resolver::{INCLUDE_DIR, TEMPLATE_DIR};
use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, SecondsFormat};
use minijinja::{AutoEscape, Environment, ErrorKind, Value, path_loader};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use thiserror::Error;

pub const ENTRY_TEMPLATE: &str = "entry.html";
pub const ARCHIVE_TEMPLATE: &str = "archive.html";
pub const INDEX_TEMPLATE: &str = "index.html";
pub const FEED_TEMPLATE: &str = "index.atom";

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),
}

/// Shared fragments included in every page.
#[derive(Debug, Clone, Default)]
pub struct Includes {
    /// Children of `<head>` in `inc/header.html`.
    pub header: String,
    /// Children of `<body>` in `inc/titlebar.html`.
    pub titlebar: String,
    /// Children of `<body>` in `inc/footer.html`.
    pub footer: String,
    /// Contents of the configured stylesheet.
    pub inline_css: String,
    /// Newest modification time among the files above.
    pub modified: Option<SystemTime>,
}

impl Includes {
    pub fn load(root: &Path, stylesheet: &str) -> Result<Self, HtmlError> {
        let inc = root.join(INCLUDE_DIR);
        let (header, header_mod) = html::extract_element(&inc.join("header.html"), "head")?;
        let (titlebar, titlebar_mod) = html::extract_element(&inc.join("titlebar.html"), "body")?;
        let (footer, footer_mod) = html::extract_element(&inc.join("footer.html"), "body")?;
        let (inline_css, css_mod) = html::read_raw(&root.join(stylesheet))?;
        Ok(Self {
            header,
            titlebar,
            footer,
            inline_css,
            modified: [header_mod, titlebar_mod, footer_mod, css_mod]
                .into_iter()
                .max(),
        })
    }
}

/// Data passed to every template.
#[derive(Debug, Serialize)]
pub struct TemplateData<'a> {
    pub domain: &'a str,
    pub site_title: &'a str,
    pub header: &'a str,
    pub inline_css: &'a str,
    pub titlebar: &'a str,
    pub footer: &'a str,
    pub entries: &'a [Entry],
    /// Most recent time anything on the site was updated.
    pub updated: Option<DateTime<FixedOffset>>,
}

impl<'a> TemplateData<'a> {
    pub fn new(
        config: &'a SiteConfig,
        includes: &'a Includes,
        entries: &'a [Entry],
        updated: Option<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            domain: &config.domain,
            site_title: &config.title,
            header: &includes.header,
            inline_css: &includes.inline_css,
            titlebar: &includes.titlebar,
            footer: &includes.footer,
            entries,
            updated,
        }
    }
}

/// The site's template set.
pub struct Templates {
    env: Environment<'static>,
    dir: PathBuf,
    last_date: Arc<Mutex<Option<NaiveDate>>>,
}

impl Templates {
    /// Prepare templates from `<root>/tpl`. Files are read on first use.
    pub fn load(root: &Path) -> Self {
        let dir = root.join(TEMPLATE_DIR);
        let last_date = Arc::new(Mutex::new(None));

        let mut env = Environment::new();
        env.set_loader(path_loader(dir.clone()));
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.set_keep_trailing_newline(true);
        env.add_filter("trunc10", trunc10);
        env.add_filter("rfc3339", rfc3339);
        let state = Arc::clone(&last_date);
        env.add_filter("datediff", move |value: Value| datediff(&state, &value));

        Self {
            env,
            dir,
            last_date,
        }
    }

    /// Modification time of a template file, if it exists.
    pub fn modified(&self, name: &str) -> Option<SystemTime> {
        fs::metadata(self.dir.join(name))
            .and_then(|m| m.modified())
            .ok()
    }

    pub fn render<S: Serialize>(&self, name: &str, data: &S) -> Result<String, RenderError> {
        *self
            .last_date
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        let template = self.env.get_template(name)?;
        Ok(template.render(data)?)
    }

    /// Render `name` into `dest`, creating parent directories as needed.
    pub fn render_to<S: Serialize>(
        &self,
        name: &str,
        data: &S,
        dest: &Path,
    ) -> Result<(), RenderError> {
        let rendered = self.render(name, data)?;
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(dest, rendered)?;
        Ok(())
    }
}

fn parse_time(value: &Value) -> Result<Option<DateTime<FixedOffset>>, minijinja::Error> {
    if value.is_undefined() || value.is_none() {
        return Ok(None);
    }
    let text = value.as_str().ok_or_else(|| {
        minijinja::Error::new(ErrorKind::InvalidOperation, "expected a timestamp string")
    })?;
    DateTime::parse_from_rfc3339(text).map(Some).map_err(|err| {
        minijinja::Error::new(
            ErrorKind::InvalidOperation,
            format!("invalid timestamp {text:?}: {err}"),
        )
    })
}

fn trunc10(value: Value) -> Result<String, minijinja::Error> {
    Ok(parse_time(&value)?
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_default())
}

fn rfc3339(value: Value) -> Result<String, minijinja::Error> {
    Ok(parse_time(&value)?
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_default())
}

fn datediff(state: &Mutex<Option<NaiveDate>>, value: &Value) -> Result<String, minijinja::Error> {
    let Some(time) = parse_time(value)? else {
        return Ok(String::new());
    };
    let date = time.date_naive();
    let mut last = state.lock().unwrap_or_else(PoisonError::into_inner);
    let cell = match *last {
        Some(prev) if prev.year() == date.year() && prev.month() == date.month() => {
            date.day().to_string()
        }
        Some(prev) if prev.year() == date.year() => format!(
            "<b>{}</b></td><td></td></tr>\n   <tr><td> {}",
            date.format("%b"),
            date.day()
        ),
        _ => format!(
            "<i><b>{}</b></i></td><td></td></tr>\n    <tr><td><b>{}</b></td><td></td></tr>\n    <tr><td> {}",
            date.year(),
            date.format("%b"),
            date.day()
        ),
    };
    *last = Some(date);
    Ok(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn templates(files: &[(&str, &str)]) -> (TempDir, Templates) {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join(TEMPLATE_DIR);
        fs::create_dir_all(&dir).unwrap();
        for (name, body) in files {
            fs::write(dir.join(name), body).unwrap();
        }
        let templates = Templates::load(tmp.path());
        (tmp, templates)
    }

    #[derive(Serialize)]
    struct Dates {
        dates: Vec<&'static str>,
    }

    #[test]
    fn trunc10_and_rfc3339() {
        let (_tmp, t) = templates(&[(
            "t",
            "{{ d | trunc10 }} {{ d | rfc3339 }} {{ u | rfc3339 }}",
        )]);
        let out = t
            .render("t", &serde_json::json!({ "d": "2024-06-01T09:30:00+00:00", "u": null }))
            .unwrap();
        assert_eq!(out, "2024-06-01 2024-06-01T09:30:00Z ");
    }

    #[test]
    fn rfc3339_keeps_offset() {
        let (_tmp, t) = templates(&[("t", "{{ d | rfc3339 }}")]);
        let out = t
            .render("t", &serde_json::json!({ "d": "2011-03-01T10:00:00-05:00" }))
            .unwrap();
        assert_eq!(out, "2011-03-01T10:00:00-05:00");
    }

    #[test]
    fn datediff_groups_by_year_and_month() {
        let (_tmp, t) = templates(&[(
            "t",
            "{% for d in dates %}[{{ d | datediff }}]{% endfor %}",
        )]);
        let data = Dates {
            dates: vec![
                "2024-06-20T00:00:00Z",
                "2024-06-03T00:00:00Z",
                "2024-05-01T00:00:00Z",
                "2023-12-31T00:00:00Z",
            ],
        };
        let out = t.render("t", &data).unwrap();
        assert_eq!(
            out,
            "[<i><b>2024</b></i></td><td></td></tr>\n    <tr><td><b>Jun</b></td><td></td></tr>\n    <tr><td> 20]\
             [3]\
             [<b>May</b></td><td></td></tr>\n   <tr><td> 1]\
             [<i><b>2023</b></i></td><td></td></tr>\n    <tr><td><b>Dec</b></td><td></td></tr>\n    <tr><td> 31]"
        );
    }

    #[test]
    fn datediff_state_resets_between_renders() {
        let (_tmp, t) = templates(&[("t", "{% for d in dates %}{{ d | datediff }}|{% endfor %}")]);
        let data = Dates {
            dates: vec!["2024-06-20T00:00:00Z"],
        };
        let first = t.render("t", &data).unwrap();
        let second = t.render("t", &data).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("2024"));
    }

    #[test]
    fn fragments_are_not_escaped() {
        let (_tmp, t) = templates(&[("page.html", "{{ body }}\n")]);
        let out = t
            .render("page.html", &serde_json::json!({ "body": "<p>a & b</p>" }))
            .unwrap();
        assert_eq!(out, "<p>a & b</p>\n");
    }

    #[test]
    fn render_to_creates_parent_directories() {
        let (tmp, t) = templates(&[("entry.html", "{{ site_title }}")]);
        let dest = tmp.path().join("dst/a/b/page.html");
        t.render_to("entry.html", &serde_json::json!({ "site_title": "Hi" }), &dest)
            .unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "Hi");
    }

    #[test]
    fn missing_template_is_an_error() {
        let (_tmp, t) = templates(&[]);
        assert!(matches!(
            t.render("nope.html", &()),
            Err(RenderError::Template(_))
        ));
        assert_eq!(t.modified("nope.html"), None);
    }

    #[test]
    fn includes_load_fragments_and_newest_mtime() {
        let tmp = TempDir::new().unwrap();
        let inc = tmp.path().join(INCLUDE_DIR);
        fs::create_dir_all(&inc).unwrap();
        fs::create_dir_all(tmp.path().join("css")).unwrap();
        fs::write(
            inc.join("header.html"),
            "<html><head><meta charset=\"utf-8\"></head></html>",
        )
        .unwrap();
        fs::write(inc.join("titlebar.html"), "<html><body><nav>t</nav></body></html>").unwrap();
        fs::write(inc.join("footer.html"), "<html><body><p>f</p></body></html>").unwrap();
        fs::write(tmp.path().join("css/b.css"), "body{}").unwrap();

        let includes = Includes::load(tmp.path(), "css/b.css").unwrap();
        assert_eq!(includes.header, r#"<meta charset="utf-8">"#);
        assert_eq!(includes.titlebar, "<nav>t</nav>");
        assert_eq!(includes.footer, "<p>f</p>");
        assert_eq!(includes.inline_css, "body{}");
        let css_mod = fs::metadata(tmp.path().join("css/b.css"))
            .unwrap()
            .modified()
            .unwrap();
        assert!(includes.modified.unwrap() >= css_mod);
    }
}
