//! Region selection patterns for bulk membership edits.
//!
//! Three forms are accepted:
//! - exact: `jcell1`
//! - wildcard: `jcell*`, `?cell1` (`*` any run, `?` one character)
//! - numeric range: `jcell1-20` (shared alphabetic prefix plus trailing integer)

use crate::error::{RegistryError, Result};
use cells_types::{Group, RegionId};
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

/// Upper bound on regions a single bulk edit may select.
pub const MAX_BULK_MATCHES: usize = 500;

static RANGE_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_]+)(\d+)-(\d+)$").ok());

#[derive(Debug, Clone)]
pub enum RegionPattern {
    Exact(String),
    Wildcard { source: String, regex: Regex },
    Range { prefix: String, start: u64, end: u64 },
}

impl RegionPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let pattern = raw.trim();
        let invalid = |reason: &str| RegistryError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        if pattern.is_empty() {
            return Err(invalid("pattern is empty"));
        }

        if let Some(caps) = RANGE_PATTERN.as_ref().and_then(|re| re.captures(pattern)) {
            let start: u64 = caps[2].parse().map_err(|_| invalid("range start is too large"))?;
            let end: u64 = caps[3].parse().map_err(|_| invalid("range end is too large"))?;
            if start > end {
                return Err(invalid("range start is after range end"));
            }
            return Ok(RegionPattern::Range {
                prefix: caps[1].to_string(),
                start,
                end,
            });
        }

        if pattern.contains(['*', '?']) {
            let mut expr = String::with_capacity(pattern.len() + 8);
            expr.push('^');
            for c in pattern.chars() {
                match c {
                    '*' => expr.push_str(".*"),
                    '?' => expr.push('.'),
                    other => expr.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
                }
            }
            expr.push('$');
            let regex = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
            return Ok(RegionPattern::Wildcard {
                source: pattern.to_string(),
                regex,
            });
        }

        Ok(RegionPattern::Exact(pattern.to_string()))
    }

    pub fn matches(&self, id: &str) -> bool {
        match self {
            RegionPattern::Exact(exact) => exact == id,
            RegionPattern::Wildcard { regex, .. } => regex.is_match(id),
            RegionPattern::Range { prefix, start, end } => id
                .strip_prefix(prefix.as_str())
                .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
                .and_then(|rest| rest.parse::<u64>().ok())
                .is_some_and(|n| (*start..=*end).contains(&n)),
        }
    }

    /// Candidates matching this pattern, in input order.
    pub fn select<'a, I>(&self, candidates: I) -> Vec<RegionId>
    where
        I: IntoIterator<Item = &'a RegionId>,
    {
        candidates
            .into_iter()
            .filter(|id| self.matches(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Counts from one bulk addition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkAddOutcome {
    pub matched: usize,
    pub added: usize,
    /// Already members
    pub skipped: usize,
    /// Refused by the group (capacity)
    pub rejected: usize,
}

/// Add every candidate matching `pattern` to `group`.
///
/// Refuses up front when more than [`MAX_BULK_MATCHES`] candidates match.
/// The caller persists once afterwards if anything was added.
pub fn bulk_add<'a, I>(group: &Group, pattern: &RegionPattern, candidates: I) -> Result<BulkAddOutcome>
where
    I: IntoIterator<Item = &'a RegionId>,
{
    let selected = pattern.select(candidates);
    if selected.len() > MAX_BULK_MATCHES {
        return Err(RegistryError::TooManyMatches {
            matched: selected.len(),
            max: MAX_BULK_MATCHES,
        });
    }

    let mut outcome = BulkAddOutcome {
        matched: selected.len(),
        ..Default::default()
    };
    for id in &selected {
        if group.contains_region(id.as_str()) {
            outcome.skipped += 1;
        } else if group.add_region(id.as_str()) {
            outcome.added += 1;
        } else {
            outcome.rejected += 1;
        }
    }

    info!(
        group = %group.name(),
        matched = outcome.matched,
        added = outcome.added,
        skipped = outcome.skipped,
        rejected = outcome.rejected,
        "Bulk add completed"
    );
    Ok(outcome)
}
