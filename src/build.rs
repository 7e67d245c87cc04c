//! The build: one walk of the publishing tree, then the aggregate views.
//!
//! ## Walk
//!
//! The tree under the root is walked once, depth-first, with each directory's
//! children visited in file-name order. Every path is resolved through the
//! [`AttributeResolver`] and handled by its attributes:
//!
//! | Path | Attributes | Action |
//! |---|---|---|
//! | directory | `IGNORE` | subtree skipped |
//! | `*.html` file | `INCLUDE` | **transform**: rendered through `entry.html`, recorded as an [`Entry`] |
//! | file | `VERBATIM` | **copy**: bytes copied unchanged |
//! | anything else | | nothing |
//!
//! Marker files and `site.toml` are never published. Symlinks and other
//! non-regular files are skipped.
//!
//! ## Staleness
//!
//! Every output is regenerated only when its *watermark*, the newest mtime
//! among its inputs, is strictly newer than the existing output:
//!
//! - copy: the source file
//! - transform: the source file, the shared includes and stylesheet,
//!   `site.toml`, and `tpl/entry.html`
//! - views: the shared inputs, the view's own template, every entry's source,
//!   and every content directory (so a deleted entry still triggers a render)
//!
//! A second build with no source changes therefore writes nothing.
//! [`BuildOptions::force`] regenerates everything.
//!
//! ## Views
//!
//! After the walk the entries are ordered newest-first and rendered into the
//! archive (every entry, no bodies), the main index and the feed (the latest
//! `feed_len` entries, with bodies). A view whose target directory was never
//! declared is skipped with a warning.

use crate::attributes::{self, AttributeSet};
use crate::config::{self, ConfigError, SiteConfig};
use crate::entry::{self, Entry};
use crate::html::{self, HtmlError};
use crate::latex::{self, LatexBackend, Tex2Im};
use crate::render::{
    ARCHIVE_TEMPLATE, ENTRY_TEMPLATE, FEED_TEMPLATE, INDEX_TEMPLATE, Includes, RenderError,
    TemplateData, Templates,
};
use crate::resolver::{
    AttributeResolver, CONTENT_EXTENSION, Location, LocationRegistry, ResolveError,
};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::slice;
use std::sync::mpsc::Sender;
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("HTML error: {0}")]
    Html(#[from] HtmlError),
    #[error("Render error: {0}")]
    Render(#[from] RenderError),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Regenerate every output regardless of mtimes.
    pub force: bool,
}

/// An aggregate page rendered from the ordered entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Archive,
    Index,
    Feed,
}

impl View {
    pub const ALL: [View; 3] = [View::Archive, View::Index, View::Feed];

    pub fn template(self) -> &'static str {
        match self {
            View::Archive => ARCHIVE_TEMPLATE,
            View::Index => INDEX_TEMPLATE,
            View::Feed => FEED_TEMPLATE,
        }
    }

    /// Directory the view is written into.
    pub fn location(self) -> Location {
        match self {
            View::Archive => Location::Archive,
            View::Index => Location::Main,
            View::Feed => Location::Feed,
        }
    }

    pub fn filename(self) -> &'static str {
        match self {
            View::Archive | View::Index => "index.html",
            View::Feed => "index.atom",
        }
    }

    fn with_bodies(self) -> bool {
        !matches!(self, View::Archive)
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            View::Archive => "archive",
            View::Index => "index",
            View::Feed => "feed",
        })
    }
}

/// Progress reported while building.
#[derive(Debug, Clone)]
pub enum BuildEvent {
    Transformed {
        source: PathBuf,
        dest: PathBuf,
    },
    Copied {
        source: PathBuf,
        dest: PathBuf,
    },
    Rendered {
        view: View,
        dest: PathBuf,
        entries: usize,
    },
    Warning(Warning),
}

/// A problem that did not stop the build.
#[derive(Debug, Clone, Serialize)]
pub struct Warning {
    pub path: PathBuf,
    pub message: String,
}

/// What one build wrote.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub transformed: u32,
    pub copied: u32,
    pub rendered: u32,
    /// Outputs skipped because they were newer than their inputs.
    pub up_to_date: u32,
}

impl BuildStats {
    /// Number of files written to the output tree.
    pub fn writes(&self) -> u32 {
        self.transformed + self.copied + self.rendered
    }
}

impl fmt::Display for BuildStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} transformed, {} copied, {} rendered, {} up to date",
            self.transformed, self.copied, self.rendered, self.up_to_date
        )
    }
}

#[derive(Debug)]
pub struct BuildOutput {
    /// Entries ordered newest-first, without bodies.
    pub entries: Vec<Entry>,
    pub stats: BuildStats,
    pub warnings: Vec<Warning>,
}

/// Build the site using `site.toml` and the `tex2im` LaTeX backend.
pub fn build(
    resolver: &mut AttributeResolver,
    options: BuildOptions,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildOutput, BuildError> {
    let config = config::load_config(resolver.root())?;
    let backend = Tex2Im::from_config(&config.latex);
    build_with_backend(resolver, &config, &backend, options, events)
}

/// Build the site with a specific LaTeX backend (allows testing with mock).
pub fn build_with_backend(
    resolver: &mut AttributeResolver,
    config: &SiteConfig,
    backend: &impl LatexBackend,
    options: BuildOptions,
    events: Option<Sender<BuildEvent>>,
) -> Result<BuildOutput, BuildError> {
    let root = resolver.root().to_path_buf();
    info!(root = %root.display(), force = options.force, "building site");

    let includes = Includes::load(&root, &config.stylesheet)?;
    let shared = newest([includes.modified, modified_time(&config::config_path(&root))]);
    let mut build = Build {
        resolver,
        config,
        backend,
        templates: Templates::load(&root),
        includes,
        shared,
        force: options.force,
        events,
        stats: BuildStats::default(),
        warnings: Vec::new(),
    };

    let entries = build.walk(&root)?;
    let entries = entry::order(entries);
    build.render_views(&entries)?;

    info!(stats = %build.stats, warnings = build.warnings.len(), "build finished");
    Ok(BuildOutput {
        entries,
        stats: build.stats,
        warnings: build.warnings,
    })
}

struct Build<'a, B: LatexBackend> {
    resolver: &'a mut AttributeResolver,
    config: &'a SiteConfig,
    backend: &'a B,
    templates: Templates,
    includes: Includes,
    /// Newest mtime among the inputs every page shares.
    shared: Option<SystemTime>,
    force: bool,
    events: Option<Sender<BuildEvent>>,
    stats: BuildStats,
    warnings: Vec<Warning>,
}

impl<B: LatexBackend> Build<'_, B> {
    fn walk(&mut self, root: &Path) -> Result<Vec<Entry>, BuildError> {
        let entry_deps = newest([self.shared, self.templates.modified(ENTRY_TEMPLATE)]);
        let mut entries = Vec::new();

        let mut walker = WalkDir::new(root).sort_by_file_name().into_iter();
        while let Some(item) = walker.next() {
            let item = item?;
            let path = item.path();
            let file_type = item.file_type();

            if file_type.is_dir() {
                if self.resolver.resolve(path)?.has(AttributeSet::IGNORE) {
                    debug!(path = %path.display(), "ignoring subtree");
                    walker.skip_current_dir();
                }
                continue;
            }
            if !file_type.is_file() || is_unpublished(root, path) {
                continue;
            }

            let attrs = self.resolver.resolve(path)?;
            if attrs.has(AttributeSet::IGNORE) {
                continue;
            }
            if attrs.has(AttributeSet::INCLUDE) && is_content(path) {
                entries.push(self.transform(path, entry_deps)?);
            } else if attrs.has(AttributeSet::VERBATIM) {
                self.copy(path)?;
            }
        }
        Ok(entries)
    }

    fn transform(&mut self, path: &Path, deps: Option<SystemTime>) -> Result<Entry, BuildError> {
        let mut document = html::load_saved(path)?;
        let dest = self.resolver.dest(path)?;
        let mut entry = Entry {
            path: path.to_path_buf(),
            title: document.title.clone(),
            url: self.resolver.url(path)?,
            created: document.created,
            updated: document.updated,
            body: None,
        };

        let watermark = newest([deps, Some(SystemTime::from(document.updated))]);
        if !self.needs_write(watermark, &dest) {
            debug!(path = %path.display(), "up to date");
            self.stats.up_to_date += 1;
            return Ok(entry);
        }

        if let Err(err) = latex::expand(&mut document, self.backend) {
            self.warn(path, err.to_string());
        }
        let mut page = entry.clone();
        page.body = Some(document.body());
        let data = TemplateData::new(
            self.config,
            &self.includes,
            slice::from_ref(&page),
            Some(page.updated),
        );
        self.templates.render_to(ENTRY_TEMPLATE, &data, &dest)?;

        debug!(path = %path.display(), dest = %dest.display(), "transformed");
        self.stats.transformed += 1;
        self.emit(BuildEvent::Transformed {
            source: path.to_path_buf(),
            dest,
        });
        entry.body = None;
        Ok(entry)
    }

    fn copy(&mut self, path: &Path) -> Result<(), BuildError> {
        let dest = self.resolver.dest(path)?;
        if !self.needs_write(modified_time(path), &dest) {
            self.stats.up_to_date += 1;
            return Ok(());
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(path, &dest)?;

        debug!(path = %path.display(), dest = %dest.display(), "copied");
        self.stats.copied += 1;
        self.emit(BuildEvent::Copied {
            source: path.to_path_buf(),
            dest,
        });
        Ok(())
    }

    fn render_views(&mut self, ordered: &[Entry]) -> Result<(), BuildError> {
        let content = newest(ordered.iter().flat_map(|entry| {
            [
                Some(SystemTime::from(entry.updated)),
                entry.path.parent().and_then(modified_time),
            ]
        }));
        let updated = entry::site_updated(ordered);
        let window = entry::latest(ordered, self.config.feed_len);
        let mut with_bodies: Option<Vec<Entry>> = None;

        for view in View::ALL {
            let Some(dir) = self
                .resolver
                .locations()
                .get(view.location())
                .map(Path::to_path_buf)
            else {
                let root = self.resolver.root().to_path_buf();
                self.warn(
                    &root,
                    format!(
                        "no {} directory; {view} not rendered",
                        view.location().marker()
                    ),
                );
                continue;
            };
            let dest = self.resolver.dest(&dir.join(view.filename()))?;

            let watermark =
                newest([self.shared, self.templates.modified(view.template()), content]);
            if !self.needs_write(watermark, &dest) {
                debug!(%view, "up to date");
                self.stats.up_to_date += 1;
                continue;
            }

            let entries = if view.with_bodies() {
                if with_bodies.is_none() {
                    with_bodies = Some(self.fill_bodies(window)?);
                }
                with_bodies.as_deref().unwrap_or_default()
            } else {
                ordered
            };
            let data = TemplateData::new(self.config, &self.includes, entries, updated);
            self.templates.render_to(view.template(), &data, &dest)?;

            debug!(%view, dest = %dest.display(), entries = entries.len(), "rendered");
            self.stats.rendered += 1;
            self.emit(BuildEvent::Rendered {
                view,
                dest,
                entries: entries.len(),
            });
        }
        Ok(())
    }

    /// Copies of `entries` with their bodies re-read from source.
    fn fill_bodies(&mut self, entries: &[Entry]) -> Result<Vec<Entry>, BuildError> {
        let mut filled = Vec::with_capacity(entries.len());
        for entry in entries {
            let (mut document, _) = html::load(&entry.path)?;
            if let Err(err) = latex::expand(&mut document, self.backend) {
                self.warn(&entry.path, err.to_string());
            }
            filled.push(Entry {
                body: Some(document.body()),
                ..entry.clone()
            });
        }
        Ok(filled)
    }

    fn needs_write(&self, watermark: Option<SystemTime>, dest: &Path) -> bool {
        self.force || is_stale(watermark, dest)
    }

    fn warn(&mut self, path: &Path, message: String) {
        warn!(path = %path.display(), "{message}");
        let warning = Warning {
            path: path.to_path_buf(),
            message,
        };
        self.emit(BuildEvent::Warning(warning.clone()));
        self.warnings.push(warning);
    }

    fn emit(&self, event: BuildEvent) {
        if let Some(tx) = &self.events {
            tx.send(event).ok();
        }
    }
}

/// Marker files, and `site.toml` at the root.
fn is_unpublished(root: &Path, path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    attributes::is_marker(&name) || (path.parent() == Some(root) && name == config::CONFIG_FILENAME)
}

fn is_content(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext == CONTENT_EXTENSION)
}

pub fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Latest of the known times.
pub fn newest(times: impl IntoIterator<Item = Option<SystemTime>>) -> Option<SystemTime> {
    times.into_iter().flatten().max()
}

/// True if `dest` is missing or older than `watermark`.
pub fn is_stale(watermark: Option<SystemTime>, dest: &Path) -> bool {
    match modified_time(dest) {
        None => true,
        Some(existing) => watermark.is_some_and(|w| w > existing),
    }
}

// ============================================================================
// Survey
// ============================================================================

/// Resolved attributes of one directory.
#[derive(Debug, Serialize)]
pub struct SurveyedDir {
    /// Path relative to the root; empty for the root itself.
    pub path: PathBuf,
    pub attributes: AttributeSet,
}

/// Every published directory and the singleton locations, without building.
#[derive(Debug, Serialize)]
pub struct Survey {
    pub root: PathBuf,
    pub directories: Vec<SurveyedDir>,
    pub locations: LocationRegistry,
}

/// Resolve every directory outside ignored subtrees.
///
/// This surfaces the same configuration errors as a build (duplicate
/// locations) without reading or writing any content.
pub fn survey(resolver: &mut AttributeResolver) -> Result<Survey, BuildError> {
    let root = resolver.root().to_path_buf();
    let mut directories = Vec::new();

    let mut walker = WalkDir::new(&root).sort_by_file_name().into_iter();
    while let Some(item) = walker.next() {
        let item = item?;
        if !item.file_type().is_dir() {
            continue;
        }
        let attributes = resolver.resolve(item.path())?;
        if attributes.has(AttributeSet::IGNORE) {
            walker.skip_current_dir();
            continue;
        }
        directories.push(SurveyedDir {
            path: item.path().strip_prefix(&root).unwrap_or(item.path()).to_path_buf(),
            attributes,
        });
    }

    Ok(Survey {
        root,
        locations: resolver.locations().clone(),
        directories,
    })
}
