//! Resolution of a recording's entry ranges against the rows of a page.
//!
//! Some pages hold several wordlists one after another, each numbered from 1.
//! A page is cut into batches wherever the numbering drops back to 1. A range
//! that reproduces a whole batch's numbering selects that batch; any other
//! range is looked up in the first batch only.

use crate::error::{ArchiveError, Result};

/// Split `items` where the entry number restarts at 1.
fn batches<T>(items: &[(T, u32)]) -> Vec<&[(T, u32)]> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut last: Option<u32> = None;
    for (i, (_, n)) in items.iter().enumerate() {
        if *n == 1 && i > start && last.is_some_and(|l| l > 1) {
            out.push(&items[start..i]);
            start = i;
        }
        last = Some(*n);
    }
    if start < items.len() {
        out.push(&items[start..]);
    }
    out
}

/// Parse `"3-7, 10, Paragraph"` into one list of entry numbers per token.
pub fn parse_ranges(fname: &str, spec: &str) -> Result<Vec<Vec<u32>>> {
    let bad = || ArchiveError::BadRange {
        file: fname.to_string(),
        range: spec.to_string(),
    };
    let number = |s: &str| s.trim().parse::<u32>().map_err(|_| bad());

    spec.split(',')
        .map(|token| {
            let token = token.trim();
            if token.eq_ignore_ascii_case("paragraph") {
                return Ok(vec![1]);
            }
            match token.split('-').collect::<Vec<_>>().as_slice() {
                [single] => Ok(vec![number(*single)?]),
                [start, end] => Ok((number(*start)?..=number(*end)?).collect()),
                _ => Err(bad()),
            }
        })
        .collect()
}

/// Ids of the entries of `items` that `spec` refers to, in lookup order.
/// Overlapping ranges yield repeated ids.
pub fn linked_entries<T: Clone>(fname: &str, spec: &str, items: &[(T, u32)]) -> Result<Vec<T>> {
    if items.is_empty() {
        return Err(ArchiveError::NoLinkedEntries {
            file: fname.to_string(),
            range: spec.to_string(),
        });
    }
    let batches = batches(items);
    let first = batches[0];

    let mut ids = Vec::new();
    for range in parse_ranges(fname, spec)? {
        let exact = if batches.len() > 1 {
            batches
                .iter()
                .find(|b| b.iter().map(|(_, n)| *n).eq(range.iter().copied()))
        } else {
            None
        };
        match exact {
            Some(batch) => ids.extend(batch.iter().map(|(id, _)| id.clone())),
            None => ids.extend(
                first
                    .iter()
                    .filter(|(_, n)| range.contains(n))
                    .map(|(id, _)| id.clone()),
            ),
        }
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(pairs: &[(&'static str, u32)]) -> Vec<(&'static str, u32)> {
        pairs.to_vec()
    }

    #[test]
    fn single_batch_range() {
        let it = items(&[("id1", 3), ("id2", 4), ("id3", 5), ("id4", 6), ("id5", 7)]);
        assert_eq!(
            linked_entries("p.html", "3-7", &it).unwrap(),
            ["id1", "id2", "id3", "id4", "id5"]
        );
    }

    #[test]
    fn exact_batch_match_wins() {
        let it = items(&[("a", 1), ("b", 2), ("c", 3), ("d", 1), ("e", 2)]);
        assert_eq!(linked_entries("p.html", "1-2", &it).unwrap(), ["d", "e"]);
    }

    #[test]
    fn inexact_range_falls_back_to_first_batch() {
        let it = items(&[("a", 1), ("b", 2), ("c", 3), ("d", 1), ("e", 2)]);
        assert_eq!(linked_entries("p.html", "2-3", &it).unwrap(), ["b", "c"]);
        assert_eq!(linked_entries("p.html", "1-3", &it).unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn paragraph_means_entry_one() {
        let it = items(&[("a", 1), ("b", 1), ("c", 2)]);
        assert_eq!(linked_entries("p.html", "Paragraph", &it).unwrap(), ["a", "b"]);
        assert_eq!(linked_entries("p.html", "paragraph", &it).unwrap(), ["a", "b"]);
    }

    #[test]
    fn repeated_ones_do_not_split() {
        // numbering never exceeded 1 before the repeat
        let it = items(&[("a", 1), ("b", 1), ("c", 2)]);
        assert_eq!(batches(&it).len(), 1);
        let it = items(&[("a", 1), ("b", 2), ("c", 1), ("d", 2), ("e", 1)]);
        assert_eq!(batches(&it).len(), 3);
    }

    #[test]
    fn multiple_tokens_keep_order_and_duplicates() {
        let it = items(&[("a", 1), ("b", 2), ("c", 3), ("d", 4)]);
        assert_eq!(
            linked_entries("p.html", "3-4, 1, 3", &it).unwrap(),
            ["c", "d", "a", "c"]
        );
        assert_eq!(
            linked_entries("p.html", "2, Paragraph", &it).unwrap(),
            ["b", "a"]
        );
    }

    #[test]
    fn empty_items_fail() {
        let it: Vec<(&str, u32)> = Vec::new();
        assert!(matches!(
            linked_entries("p.html", "1-5", &it),
            Err(ArchiveError::NoLinkedEntries { .. })
        ));
    }

    #[test]
    fn bad_range_tokens() {
        assert!(parse_ranges("p.html", "1-2-3").is_err());
        assert!(parse_ranges("p.html", "one").is_err());
        assert_eq!(parse_ranges("p.html", " 2 - 4 ").unwrap(), vec![vec![2, 3, 4]]);
    }
}
