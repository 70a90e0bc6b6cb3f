//! Canonicalization of column and attribute-tag names.
//!
//! Names are lower-cased, stripped down to ASCII letters and digits, and then
//! rewritten through a table of domain synonyms so that `"Desc."`, `"DESC"`
//! and `"Description"` all compare equal before any fuzzy scoring happens.

use tracing::trace;

use crate::logging::MATCHER;

/// Abbreviation -> canonical long form, applied in declaration order.
pub const DEFAULT_SYNONYMS: &[(&str, &str)] = &[
    ("desc", "description"),
    ("addr", "address"),
    ("power", "kw"),
    ("project", "projectname"),
    ("num", "number"),
    ("no", "number"),
];

/// Upper bound on table passes; the default table settles after two.
const MAX_PASSES: usize = 4;

#[derive(Debug, Clone)]
pub struct NameNormalizer {
    synonyms: Vec<(String, String)>,
}

impl Default for NameNormalizer {
    fn default() -> Self {
        Self::with_synonyms(DEFAULT_SYNONYMS.iter().copied())
    }
}

impl NameNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a normalizer over a custom synonym table.
    ///
    /// Both sides of every entry are themselves reduced to lower-case ASCII
    /// alphanumerics; entries that end up empty are dropped.
    pub fn with_synonyms<'a, I>(table: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let synonyms = table
            .into_iter()
            .map(|(short, long)| (strip(short), strip(long)))
            .filter(|(short, long)| !short.is_empty() && !long.is_empty())
            .collect();
        NameNormalizer { synonyms }
    }

    pub fn synonyms(&self) -> &[(String, String)] {
        &self.synonyms
    }

    /// Normalizes `name` into its comparable token. Total and deterministic.
    pub fn normalize(&self, name: &str) -> String {
        let mut current = strip(name);
        for _ in 0..MAX_PASSES {
            let next = self.apply_table(&current);
            if next == current {
                break;
            }
            current = next;
        }
        trace!(target: MATCHER, raw = name, normalized = %current, "normalized name");
        current
    }

    fn apply_table(&self, input: &str) -> String {
        self.synonyms
            .iter()
            .fold(input.to_string(), |acc, (short, long)| {
                expand(&acc, short, long)
            })
    }
}

/// Shorthand for [`NameNormalizer::normalize`] with the default table.
pub fn normalize(name: &str) -> String {
    NameNormalizer::default().normalize(name)
}

fn strip(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Replaces every occurrence of `short` with `long`, leaving occurrences that
/// are already part of `long` untouched. Inputs are ASCII-only.
fn expand(input: &str, short: &str, long: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while !rest.is_empty() {
        if rest.starts_with(long) {
            out.push_str(long);
            rest = &rest[long.len()..];
        } else if rest.starts_with(short) {
            out.push_str(long);
            rest = &rest[short.len()..];
        } else {
            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
    }
    out
}
