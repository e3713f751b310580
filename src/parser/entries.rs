use std::collections::BTreeMap;

use crate::error::{ArchiveError, Result};
use crate::exceptions;
use crate::parser::page::{Cell, Row};

pub const ENTRY: &str = "Entry";

/// Column name standing for "this page has no such field".
const ABSENT_COLUMN: &str = "NA";

/// Column name → space separated roles (`Form`, `Gloss`, ...) for one page.
pub type FieldMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Absent,
    Column(String),
}

#[derive(Debug)]
struct Columns {
    form: Source,
    gloss: Source,
}

impl Columns {
    fn resolve(fname: &str, fields: &FieldMap) -> Result<Self> {
        Ok(Self {
            form: role_source(fname, fields, "Form")?,
            gloss: role_source(fname, fields, "Gloss")?,
        })
    }
}

fn role_source(fname: &str, fields: &FieldMap, role: &'static str) -> Result<Source> {
    let columns: Vec<&String> = fields
        .iter()
        .filter(|(_, roles)| roles.split_whitespace().any(|r| r == role))
        .map(|(column, _)| column)
        .collect();
    match columns.as_slice() {
        [column] if column.as_str() == ABSENT_COLUMN => Ok(Source::Absent),
        [column] => Ok(Source::Column(column.to_string())),
        _ => Err(ArchiveError::FieldMapRole {
            file: fname.to_string(),
            role,
            found: columns.len(),
        }),
    }
}

/// One wordlist or text row after extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub id: String,
    pub form: String,
    pub gloss: String,
    pub number: u32,
    /// Non-empty cells of the row, with the normalised entry number.
    pub data: Row,
}

/// Turn the rows of a wordlist or text page into entries.
///
/// Ids are `<page stem>-<n>` counting from 1. Leading rows without an entry
/// number hold notes and are skipped; later blank numbers repeat the previous
/// one, and sub-entries such as `2.5` are folded into the preceding entry.
pub fn extract_entries(fname: &str, rows: &[Row], fields: &FieldMap) -> Result<Vec<Entry>> {
    let columns = Columns::resolve(fname, fields)?;
    let stem = fname.split('.').next().unwrap_or(fname);

    let mut entries: Vec<Entry> = Vec::new();
    let mut last: Option<String> = None;
    for (i, row) in rows.iter().enumerate() {
        let raw = row.text(ENTRY).ok_or_else(|| ArchiveError::MissingColumn {
            file: fname.to_string(),
            row: i + 1,
            column: ENTRY.to_string(),
        })?;
        let number = match (&last, raw.is_empty()) {
            (None, true) => continue,
            (Some(prev), true) => prev.clone(),
            (_, false) => raw.to_string(),
        };
        let number = if number.ends_with(".5") || number.ends_with(".7") {
            last.clone().ok_or_else(|| ArchiveError::OrphanFraction {
                file: fname.to_string(),
                value: number.clone(),
            })?
        } else {
            number
        };
        let number = match exceptions::entry_number(fname, &number) {
            Some(fixed) => fixed.to_string(),
            None => number,
        };

        let mut row = row.clone();
        if number != raw {
            row.insert(ENTRY, Cell::Text(number.clone()));
        }

        let form = match &columns.form {
            Source::Absent => "NA".to_string(),
            Source::Column(c) => {
                let text = row.text(c).ok_or_else(|| ArchiveError::MissingColumn {
                    file: fname.to_string(),
                    row: i + 1,
                    column: c.clone(),
                })?;
                match text.trim() {
                    "" => "NA".to_string(),
                    t => t.to_string(),
                }
            }
        };
        let gloss = match &columns.gloss {
            Source::Absent => String::new(),
            Source::Column(c) => row.text(c).unwrap_or("").to_string(),
        };
        let parsed = number
            .trim()
            .parse::<u32>()
            .map_err(|_| ArchiveError::BadEntryNumber {
                file: fname.to_string(),
                value: number.clone(),
            })?;

        entries.push(Entry {
            id: format!("{}-{}", stem, entries.len() + 1),
            form,
            gloss,
            number: parsed,
            data: row.non_empty(),
        });
        last = Some(number);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[(&str, &str)]) -> Row {
        cells
            .iter()
            .map(|(k, v)| (k.to_string(), Cell::Text(v.to_string())))
            .collect()
    }

    fn fields(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn notes_row_skipped_and_blanks_inherit() {
        let rows = vec![
            row(&[("Entry", ""), ("IPA", "recorded at night"), ("English", "")]),
            row(&[("Entry", "1"), ("IPA", "ma"), ("English", "water")]),
            row(&[("Entry", ""), ("IPA", "maa"), ("English", "water (pl)")]),
            row(&[("Entry", "2"), ("IPA", " "), ("English", "fire")]),
        ];
        let fm = fields(&[("IPA", "Form"), ("English", "Gloss")]);
        let entries = extract_entries("abc_word-list_1970_01.html", &rows, &fm).unwrap();

        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["abc_word-list_1970_01-1", "abc_word-list_1970_01-2", "abc_word-list_1970_01-3"]);
        let numbers: Vec<u32> = entries.iter().map(|e| e.number).collect();
        assert_eq!(numbers, [1, 1, 2]);
        assert_eq!(entries[1].data.text("Entry"), Some("1"));
        assert_eq!(entries[2].form, "NA");
        assert_eq!(entries[2].gloss, "fire");
    }

    #[test]
    fn fractional_entries_fold_into_previous() {
        let rows = vec![
            row(&[("Entry", "2"), ("IPA", "a"), ("English", "x")]),
            row(&[("Entry", "2.5"), ("IPA", "b"), ("English", "y")]),
            row(&[("Entry", "3"), ("IPA", "c"), ("English", "z")]),
        ];
        let fm = fields(&[("IPA", "Form"), ("English", "Gloss")]);
        let entries = extract_entries("p.html", &rows, &fm).unwrap();
        let numbers: Vec<u32> = entries.iter().map(|e| e.number).collect();
        assert_eq!(numbers, [2, 2, 3]);
    }

    #[test]
    fn fractional_first_entry_fails() {
        let rows = vec![row(&[("Entry", "1.5"), ("IPA", "a"), ("English", "x")])];
        let fm = fields(&[("IPA", "Form"), ("English", "Gloss")]);
        assert!(matches!(
            extract_entries("p.html", &rows, &fm),
            Err(ArchiveError::OrphanFraction { .. })
        ));
    }

    #[test]
    fn known_typo_corrected() {
        let rows = vec![row(&[("Entry", "612"), ("IPA", "a"), ("English", "x")])];
        let fm = fields(&[("IPA", "Form"), ("English", "Gloss")]);
        let entries = extract_entries("nmn_word-list_0000_01.html", &rows, &fm).unwrap();
        assert_eq!(entries[0].number, 162);
        assert_eq!(entries[0].data.text("Entry"), Some("162"));
    }

    #[test]
    fn absent_sentinels() {
        let rows = vec![row(&[("Entry", "1"), ("English", "dog")])];
        let fm = fields(&[("NA", "Form"), ("English", "Gloss")]);
        let entries = extract_entries("p.html", &rows, &fm).unwrap();
        assert_eq!(entries[0].form, "NA");
        assert_eq!(entries[0].gloss, "dog");

        let fm = fields(&[("English", "Form"), ("NA", "Gloss")]);
        let entries = extract_entries("p.html", &rows, &fm).unwrap();
        assert_eq!(entries[0].form, "dog");
        assert_eq!(entries[0].gloss, "");
    }

    #[test]
    fn field_map_needs_one_form_and_one_gloss() {
        let rows = vec![row(&[("Entry", "1"), ("IPA", "a")])];
        let err = extract_entries("p.html", &rows, &fields(&[("IPA", "Form")])).unwrap_err();
        assert!(matches!(err, ArchiveError::FieldMapRole { role: "Gloss", found: 0, .. }));

        let fm = fields(&[("IPA", "Form"), ("Narrow", "Form"), ("English", "Gloss")]);
        let err = extract_entries("p.html", &rows, &fm).unwrap_err();
        assert!(matches!(err, ArchiveError::FieldMapRole { role: "Form", found: 2, .. }));
    }

    #[test]
    fn combined_roles_in_one_column() {
        let rows = vec![row(&[("Entry", "1"), ("Text", "hello")])];
        let fm = fields(&[("Text", "Form Gloss")]);
        let entries = extract_entries("p.html", &rows, &fm).unwrap();
        assert_eq!(entries[0].form, "hello");
        assert_eq!(entries[0].gloss, "hello");
    }

    #[test]
    fn non_numeric_entry_fails() {
        let rows = vec![row(&[("Entry", "4a"), ("IPA", "a"), ("English", "x")])];
        let fm = fields(&[("IPA", "Form"), ("English", "Gloss")]);
        assert!(matches!(
            extract_entries("p.html", &rows, &fm),
            Err(ArchiveError::BadEntryNumber { .. })
        ));
    }
}
