// Keyword matching: case-insensitive containment with an optional
// single-difference tolerant mode.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Case-insensitive substring containment
    #[default]
    Exact,
    /// Containment, falling back to an aligned scan that accepts one differing character
    Tolerant,
}

impl MatchMode {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "exact" => Some(MatchMode::Exact),
            "tolerant" | "fuzzy" => Some(MatchMode::Tolerant),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMode::Exact => "exact",
            MatchMode::Tolerant => "tolerant",
        }
    }
}

/// Decide whether `keyword` occurs in `haystack`.
///
/// Both sides are case-folded here; stored keywords keep their original case.
/// An empty keyword never matches.
pub fn matches(haystack: &str, keyword: &str, mode: MatchMode) -> bool {
    if keyword.is_empty() || haystack.is_empty() {
        return false;
    }

    let haystack = haystack.to_lowercase();
    let keyword = keyword.to_lowercase();

    if haystack.contains(&keyword) {
        return true;
    }

    match mode {
        MatchMode::Exact => false,
        MatchMode::Tolerant => within_one_difference(&haystack, &keyword),
    }
}

/// Single linear pass over the longer string. Equal lengths compare index by
/// index; when one side is a character longer, the first mismatch consumes
/// that extra character instead of shifting both sides.
fn within_one_difference(a: &str, b: &str) -> bool {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let (long, short) = if a.len() >= b.len() { (&a, &b) } else { (&b, &a) };
    if long.len() - short.len() > 1 {
        return false;
    }

    let same_length = long.len() == short.len();
    let mut mismatches = 0;
    let (mut i, mut j) = (0, 0);

    while i < long.len() {
        if j < short.len() && long[i] == short[j] {
            i += 1;
            j += 1;
            continue;
        }

        mismatches += 1;
        if mismatches > 1 {
            return false;
        }

        if same_length {
            j += 1;
        }
        i += 1;
    }

    true
}
