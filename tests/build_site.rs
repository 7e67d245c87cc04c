//! End-to-end builds of a small blog through the public API.

use filetime::FileTime;
use piccolo::attributes::AttributeSet;
use piccolo::build::{self, BuildError, BuildOptions};
use piccolo::config::ConfigError;
use piccolo::resolver::{AttributeResolver, ResolveError};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use walkdir::WalkDir;

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn post(title: &str, created: &str) -> String {
    format!(
        "<html><head><title>{title}</title><meta name=\"created\" value=\"{created}\"></head>\
<body><p>{title} text</p></body></html>"
    )
}

/// A blog laid out like a real one, with a custom config and an Atom template.
fn blog() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("blog");
    let files: &[(&str, &str)] = &[
        (".root", ""),
        (".verbatim", ""),
        (".maintarget", ""),
        (
            "site.toml",
            "title = \"Field Notes\"\ndomain = \"https://notes.example/\"\nfeed_len = 2\n",
        ),
        ("robots.txt", "User-agent: *"),
        ("css/b.css", "p { color: black }"),
        ("news/.archivetarget", ""),
        ("news/.feedtarget", ""),
        ("news/2023/.include", ""),
        ("news/2023/spring.html", &post("Spring", "2023-04-01T08:00:00-05:00")),
        ("news/2023/winter.html", &post("Winter", "2023-12-21T08:00:00-05:00")),
        ("news/2024/.include", ""),
        ("news/2024/hello.html", &post("Hello", "2024-01-02T09:00:00+01:00")),
        ("news/2024/photo.jpg", "JPEG"),
        ("scratch/.ignore", ""),
        ("scratch/idea.html", &post("Idea", "2025-01-01T00:00:00+00:00")),
        (
            "inc/header.html",
            "<html><head><link rel=\"icon\" href=\"/favicon.ico\"></head></html>",
        ),
        ("inc/titlebar.html", "<html><body><h1>Field Notes</h1></body></html>"),
        ("inc/footer.html", "<html><body><small>fin</small></body></html>"),
        (
            "tpl/entry.html",
            "<html><head>{{ header }}<title>{{ entries[0].title }} - {{ site_title }}</title></head>\
<body>{{ titlebar }}<time>{{ entries[0].created | trunc10 }}</time>{{ entries[0].body }}{{ footer }}</body></html>\n",
        ),
        (
            "tpl/archive.html",
            "<table>{% for e in entries %}<tr><td>{{ e.created | datediff }}</td><td>{{ e.title }}</td></tr>{% endfor %}</table>\n",
        ),
        (
            "tpl/index.html",
            "{% for e in entries %}<article><a href=\"{{ e.url }}\">{{ e.title }}</a>{{ e.body }}</article>{% endfor %}\n",
        ),
        (
            "tpl/index.atom",
            "<feed xmlns=\"http://www.w3.org/2005/Atom\"><title>{{ site_title }}</title>\
<updated>{{ updated | rfc3339 }}</updated>\
{% for e in entries %}<entry><id>{{ domain }}{{ e.url }}</id><published>{{ e.created | rfc3339 }}</published></entry>{% endfor %}\
</feed>\n",
        ),
    ];
    for (rel, content) in files {
        write(&root.join(rel), content);
    }

    // Everything an hour old, so build outputs are strictly newer.
    let past = FileTime::from_system_time(SystemTime::now() - Duration::from_secs(3600));
    for entry in WalkDir::new(&root) {
        filetime::set_file_mtime(entry.unwrap().path(), past).unwrap();
    }
    let root = fs::canonicalize(root).unwrap();
    (tmp, root)
}

fn read(root: &Path, rel: &str) -> String {
    fs::read_to_string(root.join(rel)).unwrap()
}

#[test]
fn builds_complete_site() {
    let (_tmp, root) = blog();
    let mut resolver = AttributeResolver::discover(&root.join("news/2024")).unwrap();
    let out = build::build(&mut resolver, BuildOptions::default(), None).unwrap();

    let urls: Vec<&str> = out.entries.iter().map(|e| e.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["/news/2024/hello", "/news/2023/winter", "/news/2023/spring"]
    );
    assert!(out.warnings.is_empty());

    let hello = read(&root, "dst/news/2024/hello.html");
    assert!(hello.contains("<title>Hello - Field Notes</title>"));
    assert!(hello.contains("<time>2024-01-02</time><p>Hello text</p><small>fin</small>"));

    assert_eq!(read(&root, "dst/robots.txt"), "User-agent: *");
    assert_eq!(read(&root, "dst/css/b.css"), "p { color: black }");
    assert!(!root.join("dst/news/2024/photo.jpg").exists());
    assert!(!root.join("dst/scratch").exists());
    assert!(!root.join("dst/site.toml").exists());

    let index = read(&root, "dst/index.html");
    assert_eq!(index.matches("<article>").count(), 2);
    assert!(index.starts_with("<article><a href=\"/news/2024/hello\">Hello</a><p>Hello text</p>"));

    let feed = read(&root, "dst/news/index.atom");
    assert!(feed.contains("<id>https://notes.example//news/2024/hello</id>"));
    assert!(feed.contains("<published>2024-01-02T09:00:00+01:00</published>"));
    assert!(!feed.contains("spring"));

    let archive = read(&root, "dst/news/index.html");
    assert!(archive.contains("<i><b>2024</b></i>"));
    assert!(archive.contains("<i><b>2023</b></i>"));
    assert!(archive.contains("<b>Apr</b>"));
}

#[test]
fn rebuild_is_a_no_op_until_something_changes() {
    let (_tmp, root) = blog();
    let mut resolver = AttributeResolver::discover(&root).unwrap();
    let first = build::build(&mut resolver, BuildOptions::default(), None).unwrap();
    assert_eq!(first.stats.transformed, 3);

    let mut resolver = AttributeResolver::discover(&root).unwrap();
    let second = build::build(&mut resolver, BuildOptions::default(), None).unwrap();
    assert_eq!(second.stats.writes(), 0);

    // A config change feeds every page.
    let future = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(3600));
    filetime::set_file_mtime(root.join("site.toml"), future).unwrap();
    let mut resolver = AttributeResolver::discover(&root).unwrap();
    let third = build::build(&mut resolver, BuildOptions::default(), None).unwrap();
    assert_eq!(third.stats.transformed, 3);
    assert_eq!(third.stats.rendered, 3);
    assert_eq!(third.stats.copied, 0);
}

#[test]
fn survey_reports_resolution_without_writing() {
    let (_tmp, root) = blog();
    let mut resolver = AttributeResolver::discover(&root).unwrap();
    let survey = build::survey(&mut resolver).unwrap();
    assert!(!root.join("dst").exists());

    let news = survey
        .directories
        .iter()
        .find(|d| d.path == Path::new("news"))
        .unwrap();
    assert_eq!(
        news.attributes,
        AttributeSet::VERBATIM | AttributeSet::ARCHIVE | AttributeSet::FEED
    );
    assert!(!survey.directories.iter().any(|d| d.path.starts_with("scratch")));

    let json = serde_json::to_value(&survey).unwrap();
    assert_eq!(json["locations"]["main"], root.to_string_lossy().as_ref());
}

#[test]
fn invalid_config_stops_the_build() {
    let (_tmp, root) = blog();
    write(&root.join("site.toml"), "feed_len = 0\n");
    let mut resolver = AttributeResolver::discover(&root).unwrap();
    let err = build::build(&mut resolver, BuildOptions::default(), None).unwrap_err();
    assert!(matches!(err, BuildError::Config(ConfigError::Validation(_))));
    assert!(!root.join("dst").exists());
}

#[test]
fn second_main_target_is_a_configuration_error() {
    let (_tmp, root) = blog();
    write(&root.join("news/2024/.maintarget"), "");
    let mut resolver = AttributeResolver::discover(&root).unwrap();
    let err = build::build(&mut resolver, BuildOptions::default(), None).unwrap_err();
    match err {
        BuildError::Resolve(ResolveError::DuplicateLocation { first, second, .. }) => {
            assert_eq!(first, root);
            assert_eq!(second, root.join("news/2024"));
        }
        other => panic!("unexpected error: {other}"),
    }
}
