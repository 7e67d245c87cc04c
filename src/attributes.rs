//! Publishing attributes and the marker files that declare them.
//!
//! Every directory may contain empty marker files. Their presence (never
//! their content) sets a flag on that directory:
//!
//! | Marker           | Flag       | Cascades |
//! |------------------|------------|----------|
//! | `.root`          | `ROOT`     | no       |
//! | `.verbatim`      | `VERBATIM` | yes      |
//! | `.include`       | `INCLUDE`  | yes      |
//! | `.ignore`        | `IGNORE`   | yes      |
//! | `.maintarget`    | `MAIN`     | no       |
//! | `.archivetarget` | `ARCHIVE`  | no       |
//! | `.feedtarget`    | `FEED`     | no       |
//!
//! Non-cascading flags describe the directory itself. Cascading flags flow to
//! descendants through [`merge`].

use serde::{Serialize, Serializer};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// A small bitset of publishing flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct AttributeSet(u8);

impl AttributeSet {
    pub const NONE: Self = Self(0);
    /// Copy files without modification.
    pub const VERBATIM: Self = Self(1 << 0);
    /// Transform content files through the entry template.
    pub const INCLUDE: Self = Self(1 << 1);
    /// The main `index.html` goes in this directory.
    pub const MAIN: Self = Self(1 << 2);
    /// The `index.atom` feed goes in this directory.
    pub const FEED: Self = Self(1 << 3);
    /// The archive page goes in this directory.
    pub const ARCHIVE: Self = Self(1 << 4);
    /// Nothing at or below this directory is published.
    pub const IGNORE: Self = Self(1 << 5);
    /// The root of the publishing tree.
    pub const ROOT: Self = Self(1 << 6);

    /// Flags that are never inherited by children.
    pub const NON_CASCADING: Self =
        Self(Self::MAIN.0 | Self::FEED.0 | Self::ARCHIVE.0 | Self::ROOT.0);

    /// True if any flag in `other` is present.
    pub fn has(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn set(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Only the flags of `self` that are also in `mask`.
    pub fn masked(self, mask: Self) -> Self {
        Self(self.0 & mask.0)
    }

    /// Marker filenames for every flag present, in table order.
    pub fn marker_names(self) -> Vec<&'static str> {
        MARKERS
            .iter()
            .filter(|(_, flag)| self.has(*flag))
            .map(|(name, _)| *name)
            .collect()
    }
}

impl BitOr for AttributeSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for AttributeSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.marker_names().join(", "))
    }
}

impl Serialize for AttributeSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.marker_names())
    }
}

/// Recognized marker filenames, matched case-sensitively.
pub const MARKERS: &[(&str, AttributeSet)] = &[
    (".root", AttributeSet::ROOT),
    (".verbatim", AttributeSet::VERBATIM),
    (".include", AttributeSet::INCLUDE),
    (".ignore", AttributeSet::IGNORE),
    (".maintarget", AttributeSet::MAIN),
    (".archivetarget", AttributeSet::ARCHIVE),
    (".feedtarget", AttributeSet::FEED),
];

/// Look up the flag a marker filename declares.
pub fn from_marker(name: &str) -> Option<AttributeSet> {
    MARKERS
        .iter()
        .find(|(marker, _)| *marker == name)
        .map(|(_, flag)| *flag)
}

/// True if `name` is one of the marker filenames.
pub fn is_marker(name: &str) -> bool {
    from_marker(name).is_some()
}

/// Combine a parent's resolved attributes with a child's local markers.
///
/// - Non-cascading flags come only from `local`.
/// - `IGNORE` on either side absorbs everything cascading.
/// - Under a `VERBATIM` parent, a local `INCLUDE` wins; otherwise `VERBATIM`
///   is inherited. The same holds with the roles swapped.
/// - With neither in the ancestry the child is dormant unless it declares
///   `VERBATIM` or `INCLUDE` itself, in which case that flag starts a new
///   cascade: `merge(NONE, VERBATIM) == VERBATIM`. A rule that only ever
///   inherited these two flags would leave such a child dormant, so a marker
///   placed below an unmarked directory would have no effect.
pub fn merge(parent: AttributeSet, local: AttributeSet) -> AttributeSet {
    let mut resolved = local.masked(AttributeSet::NON_CASCADING);
    if parent.has(AttributeSet::IGNORE) || local.has(AttributeSet::IGNORE) {
        resolved.set(AttributeSet::IGNORE);
        return resolved;
    }
    if parent.has(AttributeSet::VERBATIM) {
        if local.has(AttributeSet::INCLUDE) {
            resolved.set(AttributeSet::INCLUDE);
        } else {
            resolved.set(AttributeSet::VERBATIM);
        }
    }
    if parent.has(AttributeSet::INCLUDE) {
        if local.has(AttributeSet::VERBATIM) {
            resolved.set(AttributeSet::VERBATIM);
        } else {
            resolved.set(AttributeSet::INCLUDE);
        }
    }
    if !parent.has(AttributeSet::VERBATIM | AttributeSet::INCLUDE) {
        resolved.set(local.masked(AttributeSet::VERBATIM | AttributeSet::INCLUDE));
    }
    resolved
}
