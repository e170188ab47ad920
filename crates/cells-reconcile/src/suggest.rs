//! Group suggestions for regions that belong to no group.

use regex::Regex;
use std::sync::LazyLock;

static LETTER_CELL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?i)^([a-j])cell\d+$").ok());

const GROUP_SUFFIX: &str = "cells";

/// Suggest an existing group for `region`.
///
/// `acell7` maps to `acells` when that group exists. Otherwise the group
/// whose name minus a trailing `cells` is the longest non-empty prefix of the
/// region id wins; ties go to the first name in order.
pub fn suggest_group<'a, I>(region: &str, group_names: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = group_names.into_iter().collect();
    let region_lower = region.to_ascii_lowercase();

    if let Some(caps) = LETTER_CELL.as_ref().and_then(|re| re.captures(region)) {
        let wanted = format!("{}{GROUP_SUFFIX}", caps[1].to_ascii_lowercase());
        if let Some(found) = names.iter().find(|n| n.eq_ignore_ascii_case(&wanted)) {
            return Some(found.to_string());
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for name in names {
        let lower = name.to_ascii_lowercase();
        let Some(stem) = lower.strip_suffix(GROUP_SUFFIX) else {
            continue;
        };
        if stem.is_empty() || !region_lower.starts_with(stem) {
            continue;
        }
        if best.map_or(true, |(_, len)| stem.len() > len) {
            best = Some((name, stem.len()));
        }
    }
    best.map(|(name, _)| name.to_string())
}
