use std::collections::BTreeSet;

use super::types::FileMatch;
use crate::logging::event;

/// Which matches to delete. Subset indices are 1-based, as listed to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    All,
    Subset(BTreeSet<usize>),
    None,
}

impl Selection {
    /// Parse `1`, `1,3`, `2-4`, or mixes such as `1-2,4` against a list of
    /// `len` items. Ranges are clipped to `1..=len`; reversed, malformed and
    /// wholly out-of-range tokens are dropped with a warning. Blank input
    /// selects nothing; `all` or `*` selects everything.
    pub fn parse(input: &str, len: usize) -> Selection {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Selection::None;
        }
        if trimmed.eq_ignore_ascii_case("all") || trimmed == "*" {
            return Selection::All;
        }

        let mut indices = BTreeSet::new();
        for token in trimmed.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let Some((start, end)) = parse_token(token) else {
                event!(warn, "Ignoring malformed selection '{}'", token);
                continue;
            };
            let (low, high) = (start.max(1), end.min(len));
            if start > end || low > high {
                event!(warn, "Ignoring '{}': valid numbers are 1-{}", token, len);
                continue;
            }
            if (low, high) != (start, end) {
                event!(warn, "Clipping '{}' to {}-{}", token, low, high);
            }
            indices.extend(low..=high);
        }
        Selection::Subset(indices)
    }

    /// Zero-based positions into a list of `len` items, ascending.
    pub fn indices(&self, len: usize) -> Vec<usize> {
        match self {
            Selection::All => (0..len).collect(),
            Selection::Subset(set) => set
                .iter()
                .filter(|&&i| i >= 1 && i <= len)
                .map(|i| i - 1)
                .collect(),
            Selection::None => Vec::new(),
        }
    }

    pub fn pick<'a>(&self, matches: &'a [FileMatch]) -> Vec<&'a FileMatch> {
        self.indices(matches.len())
            .into_iter()
            .map(|i| &matches[i])
            .collect()
    }

    pub fn is_empty(&self, len: usize) -> bool {
        self.indices(len).is_empty()
    }
}

fn parse_token(token: &str) -> Option<(usize, usize)> {
    match token.split_once('-') {
        Some((start, end)) => {
            let start = start.trim().parse().ok()?;
            let end = end.trim().parse().ok()?;
            Some((start, end))
        }
        None => {
            let value = token.parse().ok()?;
            Some((value, value))
        }
    }
}
