//! Shared test utilities for the piccolo test suite.
//!
//! Provides marker-tree builders for resolver tests and a complete
//! [`Site`] fixture (templates, includes, stylesheet, singleton targets) for
//! build tests. File times are pinned with `filetime` so staleness tests do
//! not depend on filesystem timestamp granularity.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let site = Site::new();
//! site.post("posts/a.html", "First", "2023-01-01T00:00:00+00:00");
//! site.backdate();
//!
//! let mut resolver = site.resolver();
//! ```

use crate::resolver::AttributeResolver;
use filetime::FileTime;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use walkdir::WalkDir;

// =========================================================================
// Marker trees
// =========================================================================

/// Create an empty file, and its parent directories.
pub fn touch(path: &Path) {
    write(path, "");
}

/// Write a file, creating parent directories.
pub fn write(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, content).unwrap();
}

/// Create directories under `root` carrying the given marker files.
///
/// `""` names `root` itself.
pub fn marker_tree(root: &Path, dirs: &[(&str, &[&str])]) {
    for (dir, markers) in dirs {
        let dir = root.join(dir);
        fs::create_dir_all(&dir).unwrap();
        for marker in *markers {
            touch(&dir.join(marker));
        }
    }
}

/// Set a file's modification time.
pub fn set_mtime(path: &Path, time: SystemTime) {
    filetime::set_file_mtime(path, FileTime::from_system_time(time)).unwrap();
}

pub fn mtime(path: &Path) -> SystemTime {
    fs::metadata(path).unwrap().modified().unwrap()
}

// =========================================================================
// Site fixture
// =========================================================================

pub const ENTRY_TPL: &str = "<html><head>{{ header }}<style>{{ inline_css }}</style>\
<title>{{ entries[0].title }}</title></head>\
<body>{{ titlebar }}{{ entries[0].body }}{{ footer }}</body></html>\n";

pub const ARCHIVE_TPL: &str = "{% for e in entries %}\
<a href=\"{{ e.url }}\">{{ e.title }}</a> {{ e.created | trunc10 }}\n{% endfor %}";

pub const INDEX_TPL: &str = "{% for e in entries %}\
<h1>{{ e.title }}</h1>{{ e.body }}\n{% endfor %}updated={{ updated | rfc3339 }}\n";

pub const FEED_TPL: &str = "<feed><title>{{ site_title }}</title><id>{{ domain }}</id>\
{% for e in entries %}<entry><title>{{ e.title }}</title><content>{{ e.body }}</content></entry>{% endfor %}\
</feed>\n";

/// A complete publishing tree in a temp directory:
///
/// ```text
/// site/             .root .verbatim .maintarget
/// ├── archives/     .archivetarget
/// ├── feed/         .feedtarget
/// ├── posts/        .include
/// ├── css/b.css
/// ├── inc/          header.html titlebar.html footer.html
/// └── tpl/          entry.html archive.html index.html index.atom
/// ```
pub struct Site {
    _tmp: TempDir,
    pub root: PathBuf,
}

impl Site {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("site");
        marker_tree(
            &root,
            &[
                ("", &[".root", ".verbatim", ".maintarget"]),
                ("archives", &[".archivetarget"]),
                ("feed", &[".feedtarget"]),
                ("posts", &[".include"]),
            ],
        );
        let root = fs::canonicalize(root).unwrap();
        let site = Self { _tmp: tmp, root };
        site.write("tpl/entry.html", ENTRY_TPL);
        site.write("tpl/archive.html", ARCHIVE_TPL);
        site.write("tpl/index.html", INDEX_TPL);
        site.write("tpl/index.atom", FEED_TPL);
        site.write(
            "inc/header.html",
            "<html><head><meta charset=\"utf-8\"></head></html>",
        );
        site.write(
            "inc/titlebar.html",
            "<html><body><nav>BitWorking</nav></body></html>",
        );
        site.write("inc/footer.html", "<html><body><p>footer</p></body></html>");
        site.write("css/b.css", "body { margin: 0 }");
        site
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        write(&self.path(rel), content);
    }

    pub fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    /// Write an HTML post with a `created` meta element.
    pub fn post(&self, rel: &str, title: &str, created: &str) {
        self.write(rel, &post(title, Some(created), &format!("<p>{title} body</p>")));
    }

    /// Set every file and directory in the tree an hour into the past, so
    /// anything the build writes is unambiguously newer.
    pub fn backdate(&self) {
        let past = SystemTime::now() - Duration::from_secs(3600);
        for entry in WalkDir::new(&self.root) {
            set_mtime(entry.unwrap().path(), past);
        }
    }

    /// Push a file's mtime an hour into the future.
    pub fn bump(&self, rel: &str) {
        set_mtime(&self.path(rel), SystemTime::now() + Duration::from_secs(3600));
    }

    pub fn resolver(&self) -> AttributeResolver {
        AttributeResolver::discover(&self.root).unwrap()
    }
}

/// An HTML content document.
pub fn post(title: &str, created: Option<&str>, body: &str) -> String {
    let meta = created
        .map(|c| format!("<meta name=\"created\" value=\"{c}\">"))
        .unwrap_or_default();
    format!("<html><head><title>{title}</title>{meta}</head><body>{body}</body></html>")
}
