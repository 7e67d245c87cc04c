//! CLI output formatting for builds and surveys.
//!
//! Paths are always shown relative to the publishing root, so the output
//! reads the same wherever the site lives.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! VERBATIM: css/b.css
//! INCLUDE:  posts/a.html → dst/posts/a.html
//! Warning:  posts/math.html: 1 LaTeX element(s) not converted; ...
//! ARCHIVE:  dst/archives/index.html (3 entries)
//! INDEX:    dst/index.html (3 entries)
//! FEED:     dst/feed/index.atom (3 entries)
//!
//! Built 3 entries: 3 transformed, 1 copied, 3 rendered, 0 up to date
//! ```
//!
//! ## Check
//!
//! ```text
//! Directories
//!     ./            [.root, .verbatim, .maintarget]
//!     archives/     [.verbatim, .archivetarget]
//!     posts/        [.include]
//!
//! Locations
//!     main:    ./
//!     archive: archives/
//!     feed:    (none)
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::build::{BuildEvent, BuildOutput, Survey, View};
use crate::resolver::Location;
use std::path::Path;

/// Width of the label column in build lines (`VERBATIM: ` is the longest).
const LABEL_WIDTH: usize = 10;

/// Path relative to the root; `.` for the root itself.
fn relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.display().to_string(),
        Err(_) => path.display().to_string(),
    }
}

/// Directory path relative to the root, with a trailing slash.
fn relative_dir(path: &Path, root: &Path) -> String {
    format!("{}/", relative(path, root))
}

fn labeled(label: &str, rest: String) -> String {
    format!("{:<width$}{rest}", format!("{label}:"), width = LABEL_WIDTH)
}

fn count(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

// ============================================================================
// Build output
// ============================================================================

/// Format one build progress event as display lines.
pub fn format_build_event(event: &BuildEvent, root: &Path) -> Vec<String> {
    let line = match event {
        BuildEvent::Transformed { source, dest } => labeled(
            "INCLUDE",
            format!("{} \u{2192} {}", relative(source, root), relative(dest, root)),
        ),
        BuildEvent::Copied { source, .. } => labeled("VERBATIM", relative(source, root)),
        BuildEvent::Rendered {
            view,
            dest,
            entries,
        } => {
            let label = match view {
                View::Archive => "ARCHIVE",
                View::Index => "INDEX",
                View::Feed => "FEED",
            };
            labeled(
                label,
                format!("{} ({})", relative(dest, root), count(*entries, "entry", "entries")),
            )
        }
        BuildEvent::Warning(warning) => labeled(
            "Warning",
            format!("{}: {}", relative(&warning.path, root), warning.message),
        ),
    };
    vec![line]
}

/// Format the closing summary of a build.
pub fn format_build_summary(output: &BuildOutput) -> Vec<String> {
    let mut lines = vec![format!(
        "Built {}: {}",
        count(output.entries.len(), "entry", "entries"),
        output.stats
    )];
    if !output.warnings.is_empty() {
        lines.push(count(output.warnings.len(), "warning", "warnings"));
    }
    lines
}

/// Print the build summary to stdout.
pub fn print_build_summary(output: &BuildOutput) {
    for line in format_build_summary(output) {
        println!("{}", line);
    }
}

// ============================================================================
// Check output
// ============================================================================

/// Format a survey: each published directory with its resolved attributes,
/// then the singleton locations.
pub fn format_survey(survey: &Survey) -> Vec<String> {
    let root = survey.root.as_path();
    let mut lines = vec!["Directories".to_string()];

    let names: Vec<String> = survey
        .directories
        .iter()
        .map(|dir| relative_dir(&root.join(&dir.path), root))
        .collect();
    let width = names.iter().map(String::len).max().unwrap_or(0);
    for (name, dir) in names.iter().zip(&survey.directories) {
        lines.push(format!("    {name:<width$}    {}", dir.attributes));
    }

    lines.push(String::new());
    lines.push("Locations".to_string());
    for (label, location) in [
        ("main", Location::Main),
        ("archive", Location::Archive),
        ("feed", Location::Feed),
    ] {
        let shown = survey
            .locations
            .get(location)
            .map(|path| relative_dir(path, root))
            .unwrap_or_else(|| "(none)".to_string());
        lines.push(format!("    {:<9}{shown}", format!("{label}:")));
    }
    lines
}

/// Print a survey to stdout.
pub fn print_survey(survey: &Survey) {
    for line in format_survey(survey) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
