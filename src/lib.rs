//! # Piccolo
//!
//! An incremental static site generator for a blog. The filesystem is the
//! configuration: empty *marker files* in a directory decide how everything
//! beneath it is published, and modification times decide what needs
//! rebuilding.
//!
//! # Architecture: Resolve, Walk, Aggregate
//!
//! ```text
//! 1. Resolve   marker files      →  AttributeSet per path  (cascading, memoized)
//! 2. Walk      source tree       →  dst/ pages + copies    (mtime-gated)
//! 3. Aggregate ordered entries   →  archive, index, feed   (mtime-gated)
//! ```
//!
//! A single build walks the tree once. Every path is resolved on first sight,
//! parents before children, and either transformed, copied, or skipped. The
//! entries collected on the way feed the three aggregate views.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`attributes`] | Flag set, marker vocabulary, and the parent/child merge rule |
//! | [`resolver`] | Memoizing resolver, write-once location registry, output path and URL mapping |
//! | [`build`] | The walk, staleness checks, aggregate views, and the read-only survey |
//! | [`entry`] | Entries, newest-first ordering, and the index/feed window |
//! | [`html`] | Content parsing (`scraper`) and include fragment extraction |
//! | [`latex`] | `<latex-pic>` expansion through a pluggable backend (`tex2im`) |
//! | [`render`] | `minijinja` templates from `tpl/` and the date filters |
//! | [`config`] | `site.toml` loading and validation |
//! | [`output`] | CLI output formatting for builds and surveys |
//!
//! # Design Decisions
//!
//! ## Markers Over Front-Matter
//!
//! Publishing rules live next to the content as empty files (`.include`,
//! `.verbatim`, `.ignore`, ...) instead of in a central config. Moving a
//! directory moves its rules with it, and `ls -a` shows how a directory is
//! published. Role markers (`.maintarget`, `.archivetarget`, `.feedtarget`,
//! `.root`) describe one directory only and must each appear once.
//!
//! ## Mtime Staleness, No Cache File
//!
//! Every output is rebuilt only when the newest of its inputs is newer than
//! the output itself. There is no manifest to get out of sync: deleting
//! `dst/` is a full rebuild, and `--force` is the same without the delete.
//!
//! ## Templates On Disk
//!
//! Page layout is authored by the site owner in `tpl/`, not compiled into the
//! binary, so templates are [minijinja](https://docs.rs/minijinja) files read
//! at build time. Their mtimes take part in staleness like any other input.

pub mod attributes;
pub mod build;
pub mod config;
pub mod entry;
pub mod html;
pub mod latex;
pub mod output;
pub mod render;
pub mod resolver;

#[cfg(test)]
pub(crate) mod test_helpers;
