//! Attribute resolution down the directory tree.
//!
//! [`AttributeResolver`] answers "how is this path published?" by reading the
//! marker files at the path and merging them with the resolved attributes of
//! its parent. Results are memoized by path, so every directory is read once
//! per build no matter how many of its descendants are queried.
//!
//! While resolving, the resolver records the singleton locations (root, main
//! index, archive, feed) into a [`LocationRegistry`]. Each slot is write-once:
//! a second, different directory declaring the same role is a configuration
//! error that names both directories.
//!
//! ## Resolution order
//!
//! For an uncached path the resolver climbs towards the filesystem top,
//! reading local markers, until it reaches a cached ancestor or a directory
//! marked `.root`. It then walks back down the recorded chain, merging each
//! level with its parent. Parents are therefore always resolved before their
//! children, and deep trees never recurse.
//!
//! ## Well-known directories
//!
//! Once the root is known, `dst/`, `tmp/`, `tpl/`, `inc/` and `.git/` under it
//! are forced to `IGNORE` regardless of their markers.

use crate::attributes::{self, AttributeSet};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Output subtree, relative to the root.
pub const OUTPUT_DIR: &str = "dst";
/// Scratch directory, relative to the root.
pub const TEMP_DIR: &str = "tmp";
/// Template directory, relative to the root.
pub const TEMPLATE_DIR: &str = "tpl";
/// Shared include fragments, relative to the root.
pub const INCLUDE_DIR: &str = "inc";

const WELL_KNOWN_DIRS: &[&str] = &[OUTPUT_DIR, TEMP_DIR, TEMPLATE_DIR, INCLUDE_DIR, ".git"];

/// Extension of content files eligible for transformation.
pub const CONTENT_EXTENSION: &str = "html";
const CONTENT_SUFFIX: &str = ".html";

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Multiple {location} directories found: {first}, {second}", first = .first.display(), second = .second.display())]
    DuplicateLocation {
        location: Location,
        first: PathBuf,
        second: PathBuf,
    },
    #[error("No .root found above {0}")]
    NoRoot(PathBuf),
    #[error("Path is outside the publishing root: {0}")]
    OutsideRoot(PathBuf),
}

/// One of the singleton directory roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Location {
    Root,
    Main,
    Archive,
    Feed,
}

impl Location {
    fn flag(self) -> AttributeSet {
        match self {
            Location::Root => AttributeSet::ROOT,
            Location::Main => AttributeSet::MAIN,
            Location::Archive => AttributeSet::ARCHIVE,
            Location::Feed => AttributeSet::FEED,
        }
    }

    pub fn marker(self) -> &'static str {
        match self {
            Location::Root => ".root",
            Location::Main => ".maintarget",
            Location::Archive => ".archivetarget",
            Location::Feed => ".feedtarget",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.marker())
    }
}

const LOCATIONS: [Location; 4] = [
    Location::Root,
    Location::Main,
    Location::Archive,
    Location::Feed,
];

/// Write-once slots for the singleton directories.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LocationRegistry {
    pub root: Option<PathBuf>,
    pub main: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub feed: Option<PathBuf>,
}

impl LocationRegistry {
    pub fn get(&self, location: Location) -> Option<&Path> {
        self.slot(location).as_deref()
    }

    fn slot(&self, location: Location) -> &Option<PathBuf> {
        match location {
            Location::Root => &self.root,
            Location::Main => &self.main,
            Location::Archive => &self.archive,
            Location::Feed => &self.feed,
        }
    }

    fn slot_mut(&mut self, location: Location) -> &mut Option<PathBuf> {
        match location {
            Location::Root => &mut self.root,
            Location::Main => &mut self.main,
            Location::Archive => &mut self.archive,
            Location::Feed => &mut self.feed,
        }
    }

    /// Assign `path` to a slot. Re-assigning the same path is a no-op.
    pub fn assign(&mut self, location: Location, path: &Path) -> Result<(), ResolveError> {
        let slot = self.slot_mut(location);
        if let Some(existing) = slot.as_deref() {
            if existing == path {
                return Ok(());
            }
            return Err(ResolveError::DuplicateLocation {
                location,
                first: existing.to_path_buf(),
                second: path.to_path_buf(),
            });
        }
        *slot = Some(path.to_path_buf());
        Ok(())
    }

    /// Record every location flag carried by `local`.
    fn register(&mut self, path: &Path, local: AttributeSet) -> Result<(), ResolveError> {
        for location in LOCATIONS {
            if local.has(location.flag()) {
                self.assign(location, path)?;
            }
        }
        Ok(())
    }
}

/// Memoizing attribute resolver for one publishing tree.
///
/// Construct with [`AttributeResolver::discover`]; all state lives in the
/// value, so independent builds never share a cache or registry.
#[derive(Debug)]
pub struct AttributeResolver {
    cache: HashMap<PathBuf, AttributeSet>,
    locations: LocationRegistry,
    root: PathBuf,
}

impl AttributeResolver {
    /// Find the publishing root at or above `start` and prepare a resolver.
    pub fn discover(start: &Path) -> Result<Self, ResolveError> {
        let start = fs::canonicalize(start)?;
        let mut cache = HashMap::new();
        let mut locations = LocationRegistry::default();
        resolve_into(&mut cache, &mut locations, &start)?;
        let root = locations
            .root
            .clone()
            .ok_or_else(|| ResolveError::NoRoot(start.clone()))?;
        for name in WELL_KNOWN_DIRS {
            cache.insert(root.join(name), AttributeSet::IGNORE);
        }
        Ok(Self {
            cache,
            locations,
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn locations(&self) -> &LocationRegistry {
        &self.locations
    }

    /// Resolved attributes for `path`.
    pub fn resolve(&mut self, path: &Path) -> Result<AttributeSet, ResolveError> {
        resolve_into(&mut self.cache, &mut self.locations, &normalize(path))
    }

    /// Destination of `path` inside the output subtree.
    ///
    /// `root/posts/a.html` → `root/dst/posts/a.html`
    pub fn dest(&self, path: &Path) -> Result<PathBuf, ResolveError> {
        Ok(self.root.join(OUTPUT_DIR).join(self.relative(path)?))
    }

    /// Site-absolute URL of `path`, with the content extension stripped.
    ///
    /// `root/posts/a.html` → `/posts/a`
    pub fn url(&self, path: &Path) -> Result<String, ResolveError> {
        let rel = self.relative(path)?;
        let mut parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        if let Some(last) = parts.last_mut()
            && let Some(stem) = last.strip_suffix(CONTENT_SUFFIX).map(str::to_string)
        {
            *last = stem;
        }
        Ok(format!("/{}", parts.join("/")))
    }

    fn relative<'a>(&self, path: &'a Path) -> Result<&'a Path, ResolveError> {
        path.strip_prefix(&self.root)
            .map_err(|_| ResolveError::OutsideRoot(path.to_path_buf()))
    }
}

/// Resolve `path` against a cache and registry.
fn resolve_into(
    cache: &mut HashMap<PathBuf, AttributeSet>,
    locations: &mut LocationRegistry,
    path: &Path,
) -> Result<AttributeSet, ResolveError> {
    if let Some(&attrs) = cache.get(path) {
        return Ok(attrs);
    }

    // Climb until something already known: a cached ancestor or the root.
    let mut pending: Vec<(PathBuf, AttributeSet)> = Vec::new();
    let mut current = path.to_path_buf();
    let mut resolved = loop {
        if let Some(&attrs) = cache.get(&current) {
            break attrs;
        }
        let local = local_attributes(&current)?;
        locations.register(&current, local)?;
        if local.has(AttributeSet::ROOT) {
            cache.insert(current, local);
            break local;
        }
        let Some(parent) = current.parent().map(Path::to_path_buf) else {
            return Err(ResolveError::NoRoot(path.to_path_buf()));
        };
        pending.push((current, local));
        current = parent;
    };

    while let Some((dir, local)) = pending.pop() {
        resolved = attributes::merge(resolved, local);
        cache.insert(dir, resolved);
    }
    Ok(resolved)
}

/// Flags declared by marker files directly inside `path`.
///
/// Files carry no markers of their own.
fn local_attributes(path: &Path) -> Result<AttributeSet, ResolveError> {
    let mut attrs = AttributeSet::NONE;
    if !path.is_dir() {
        return Ok(attrs);
    }
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if let Some(flag) = attributes::from_marker(&entry.file_name().to_string_lossy()) {
            attrs.set(flag);
        }
    }
    Ok(attrs)
}

/// Lexically clean a path so `a/./b` and `a/b` share one cache slot.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
