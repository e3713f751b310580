//! Per-file corrections for known defects of the archive site.
//!
//! Every deviation that is fixed rather than reported lives in [`EXCEPTIONS`].
//! Each stage asks the table once for the file (or language directory) it is
//! about to process; anything not listed here surfaces as an
//! [`ArchiveError`](crate::error::ArchiveError).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    AnyPage,
    Page(&'static str),
    Language(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fix {
    /// Literal substitution in the raw markup before parsing.
    Markup {
        from: &'static str,
        to: &'static str,
    },
    /// Data rows hold `width` values packed into two cells, joined by `sep`.
    SplitJoinedCells { sep: char, width: usize },
    /// Typo in a wordlist entry number.
    EntryNumber {
        from: &'static str,
        to: &'static str,
    },
    /// The index row at `position` links the wrong wordlist page.
    WordlistLink { position: usize, href: &'static str },
    /// The language directory has no record details page.
    NoRecordDetails,
}

pub struct Exception {
    pub target: Target,
    pub fix: Fix,
}

pub static EXCEPTIONS: &[Exception] = &[
    Exception {
        target: Target::AnyPage,
        fix: Fix::Markup { from: "<t/d>", to: "</td>" },
    },
    Exception {
        target: Target::Page("hye_word-list_1973_01.html"),
        fix: Fix::SplitJoinedCells { sep: '\u{a0}', width: 4 },
    },
    Exception {
        target: Target::Page("hye_word-list_1983_01.html"),
        fix: Fix::SplitJoinedCells { sep: '\u{a0}', width: 4 },
    },
    Exception {
        target: Target::Page("nmn_word-list_0000_01.html"),
        fix: Fix::EntryNumber { from: "612", to: "162" },
    },
    Exception {
        target: Target::Language("MNR"),
        fix: Fix::WordlistLink { position: 1, href: "mnr_word-list.html#1" },
    },
    Exception {
        target: Target::Language("MZQ"),
        fix: Fix::NoRecordDetails,
    },
];

fn page_fixes<'a>(fname: &'a str) -> impl Iterator<Item = Fix> + 'a {
    EXCEPTIONS
        .iter()
        .filter(move |e| match e.target {
            Target::AnyPage => true,
            Target::Page(p) => p == fname,
            Target::Language(_) => false,
        })
        .map(|e| e.fix)
}

fn language_fixes<'a>(code: &'a str) -> impl Iterator<Item = Fix> + 'a {
    EXCEPTIONS
        .iter()
        .filter(move |e| matches!(e.target, Target::Language(c) if c == code))
        .map(|e| e.fix)
}

/// Apply all markup substitutions registered for `fname`.
pub fn repair_markup(fname: &str, html: &str) -> String {
    page_fixes(fname).fold(html.to_string(), |acc, fix| match fix {
        Fix::Markup { from, to } => acc.replace(from, to),
        _ => acc,
    })
}

pub fn joined_cells(fname: &str) -> Option<(char, usize)> {
    page_fixes(fname).find_map(|fix| match fix {
        Fix::SplitJoinedCells { sep, width } => Some((sep, width)),
        _ => None,
    })
}

/// Returns the replacement for `value` if it is a registered typo in `fname`.
pub fn entry_number(fname: &str, value: &str) -> Option<&'static str> {
    page_fixes(fname).find_map(|fix| match fix {
        Fix::EntryNumber { from, to } if from == value => Some(to),
        _ => None,
    })
}

pub fn wordlist_link(code: &str, position: usize) -> Option<&'static str> {
    language_fixes(code).find_map(|fix| match fix {
        Fix::WordlistLink { position: p, href } if p == position => Some(href),
        _ => None,
    })
}

pub fn allows_missing_details(code: &str) -> bool {
    language_fixes(code).any(|fix| fix == Fix::NoRecordDetails)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markup_repair_applies_to_every_page() {
        assert_eq!(
            repair_markup("abc_word-list.html", "<td>x<t/d><td>y<t/d>"),
            "<td>x</td><td>y</td>"
        );
    }

    #[test]
    fn joined_cells_only_for_armenian_lists() {
        assert_eq!(joined_cells("hye_word-list_1973_01.html"), Some(('\u{a0}', 4)));
        assert_eq!(joined_cells("hye_word-list_1990_01.html"), None);
    }

    #[test]
    fn entry_number_typo() {
        assert_eq!(entry_number("nmn_word-list_0000_01.html", "612"), Some("162"));
        assert_eq!(entry_number("nmn_word-list_0000_01.html", "613"), None);
        assert_eq!(entry_number("other.html", "612"), None);
    }

    #[test]
    fn language_scoped_fixes() {
        assert_eq!(wordlist_link("MNR", 1), Some("mnr_word-list.html#1"));
        assert_eq!(wordlist_link("MNR", 2), None);
        assert!(allows_missing_details("MZQ"));
        assert!(!allows_missing_details("MNR"));
    }
}
