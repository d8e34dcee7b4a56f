//! Tag vocabulary and segmentation predicates.
//!
//! Tags are free-form staff-entered strings. Three literals carry meaning for
//! statistics and context assembly; they are named constants rather than a
//! closed type so that arbitrary tags stay representable.

use super::Student;
use serde::{Deserialize, Deserializer, Serialize};

/// Student has not been reached out to in over a week.
pub const NOT_CONTACTED: &str = "Students not contacted in 7 days";
/// Student shows strong interest.
pub const HIGH_INTENT: &str = "High intent";
/// Student needs help with application essays.
pub const NEEDS_ESSAY_HELP: &str = "Needs essay help";

/// One of the three tags with a defined meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalTag {
    /// [`NOT_CONTACTED`].
    NotContacted,
    /// [`HIGH_INTENT`].
    HighIntent,
    /// [`NEEDS_ESSAY_HELP`].
    NeedsEssayHelp,
}

impl CanonicalTag {
    /// All canonical tags, in dossier order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::NotContacted, Self::HighIntent, Self::NeedsEssayHelp]
    }

    /// The exact tag literal.
    #[must_use]
    pub const fn literal(&self) -> &'static str {
        match self {
            Self::NotContacted => NOT_CONTACTED,
            Self::HighIntent => HIGH_INTENT,
            Self::NeedsEssayHelp => NEEDS_ESSAY_HELP,
        }
    }

    /// Explanatory line used in the context dossier.
    #[must_use]
    pub const fn explanation(&self) -> &'static str {
        match self {
            Self::NotContacted => {
                "- NOT CONTACTED: Student hasn't been reached out to in over a week"
            },
            Self::HighIntent => "- HIGH INTENT: Student shows strong interest and engagement",
            Self::NeedsEssayHelp => {
                "- ESSAY HELP: Student requires assistance with application essays"
            },
        }
    }

    /// Looks up the canonical tag for an exact literal.
    #[must_use]
    pub fn from_literal(literal: &str) -> Option<Self> {
        Self::all().iter().copied().find(|tag| tag.literal() == literal)
    }
}

/// A student's tags: duplicates collapsed, insertion order kept for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Creates an empty tag set.
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Inserts a tag. Returns false if it was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.contains(&tag) {
            return false;
        }
        self.0.push(tag);
        true
    }

    /// Exact, case-sensitive membership test.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    /// Number of distinct tags.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true when no tags are assigned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Canonical tags present, in dossier order.
    pub fn canonical(&self) -> impl Iterator<Item = CanonicalTag> + '_ {
        CanonicalTag::all()
            .iter()
            .copied()
            .filter(|tag| self.contains(tag.literal()))
    }
}

impl From<Vec<String>> for TagSet {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<TagSet> for Vec<String> {
    fn from(tags: TagSet) -> Self {
        tags.0
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        for tag in iter {
            set.insert(tag);
        }
        set
    }
}

/// Deserializes a tag list where `null` means "no tags".
pub(crate) fn deserialize_nullable<'de, D>(deserializer: D) -> Result<TagSet, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?
        .map(TagSet::from)
        .unwrap_or_default())
}

/// Exact membership of `tag` in the student's tags.
///
/// Case-sensitive, no normalization: `"high intent"` does not match
/// [`HIGH_INTENT`].
#[must_use]
pub fn has_tag(student: &Student, tag: &str) -> bool {
    student.tags.contains(tag)
}
