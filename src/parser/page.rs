use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ArchiveError, Result};
use crate::exceptions;

static TABLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("table").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TITLE: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());

const RIGHTS_OF_ACCESS: &str = "Rights of Access";

/// Column headers that different pages use for the same field.
const HEADER_SYNONYMS: &[(&str, &str)] = &[
    ("Zulu", "Language"),
    ("Hindi", "Language"),
    ("Armenian", "Language"),
    ("Haiǀǀom", "Language"),
    ("Language:", "Language"),
    ("Tiff Image", "TIFF Image"),
    ("Tiff Image 2", "TIFF Image 2"),
];

/// Value of one table cell: plain text, or the target and text of its link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Link(String, Option<String>),
}

impl Default for Cell {
    fn default() -> Self {
        Cell::Text(String::new())
    }
}

impl Cell {
    pub fn text(&self) -> &str {
        match self {
            Cell::Text(t) => t,
            Cell::Link(_, t) => t.as_deref().unwrap_or(""),
        }
    }

    /// Link target for links, the text itself for non-empty text cells.
    pub fn target(&self) -> Option<&str> {
        match self {
            Cell::Text(t) if t.is_empty() => None,
            Cell::Text(t) => Some(t),
            Cell::Link(href, _) => Some(href),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Text(t) if t.is_empty())
    }
}

/// One table row keyed by column header, in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(Vec<(String, Cell)>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later values for a repeated header replace earlier ones in place.
    pub fn insert(&mut self, key: impl Into<String>, value: Cell) {
        let key = key.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Cell> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.get(key).map(Cell::text)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    /// Copy of the row without empty cells.
    pub fn non_empty(&self) -> Row {
        self.0.iter().filter(|(_, v)| !v.is_empty()).cloned().collect()
    }
}

impl FromIterator<(String, Cell)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Cell)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.insert(k, v);
        }
        row
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Row {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct RowVisitor;

        impl<'de> Visitor<'de> for RowVisitor {
            type Value = Row;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to cells")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<Row, A::Error> {
                let mut row = Row::new();
                while let Some((k, v)) = access.next_entry::<String, Cell>()? {
                    row.insert(k, v);
                }
                Ok(row)
            }
        }

        deserializer.deserialize_map(RowVisitor)
    }
}

/// Header plus data rows of the data table of a listing page.
/// Row `n` of `rows` sits at position `n + 1` of the table.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

/// Field name to value, as read from one "record details" table.
pub type Details = BTreeMap<String, String>;

/// Parse a page, repairing the markup defects registered for `fname` first.
pub fn parse_document(fname: &str, html: &str) -> Html {
    Html::parse_document(&exceptions::repair_markup(fname, html))
}

pub fn document_title(doc: &Html) -> Option<String> {
    doc.select(&TITLE)
        .next()
        .and_then(leading_text)
        .map(|t| t.trim().to_string())
}

/// Read every table of a record details page as key/value pairs, keyed by
/// the table's 1-based position. Each table must declare that position in
/// its `Recording` field.
pub fn read_detail_table(doc: &Html, fname: &str) -> Result<BTreeMap<usize, Details>> {
    let mut out = BTreeMap::new();
    for (position, table) in doc.select(&TABLE).enumerate().map(|(i, t)| (i + 1, t)) {
        let mut details = Details::new();
        for tr in table.select(&TR) {
            let cells: Vec<ElementRef> = child_elements(tr, "td").collect();
            let [key, value] = cells.as_slice() else {
                return Err(ArchiveError::MalformedDetailRow {
                    file: fname.to_string(),
                    cells: cells.len(),
                });
            };
            let key = joined_text(*key, "");
            let value = if key == RIGHTS_OF_ACCESS {
                child_elements(*value, "a")
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .ok_or_else(|| ArchiveError::MissingRightsLink {
                        file: fname.to_string(),
                    })?
                    .to_string()
            } else {
                joined_text(*value, "")
            };
            details.insert(key, value);
        }
        fold_synonyms(&mut details, fname)?;

        let declared = details
            .get("Recording")
            .ok_or_else(|| ArchiveError::MissingRecordingField {
                file: fname.to_string(),
                position,
            })?;
        if declared.trim().parse::<usize>().ok() != Some(position) {
            return Err(ArchiveError::PositionMismatch {
                file: fname.to_string(),
                position,
                declared: declared.clone(),
            });
        }
        out.insert(position, details);
    }
    Ok(out)
}

fn fold_synonyms(details: &mut Details, fname: &str) -> Result<()> {
    for (from, to) in HEADER_SYNONYMS {
        if let Some(value) = details.remove(*from) {
            if details.contains_key(*to) {
                return Err(ArchiveError::DuplicateLanguageColumn {
                    file: fname.to_string(),
                    column: from.to_string(),
                });
            }
            details.insert(to.to_string(), value);
        }
    }
    Ok(())
}

/// Read the last table of a listing page. The first row is the header;
/// blank header cells are named by their 1-based column number. Short rows
/// are padded with empty cells, long rows are cut to the header width.
pub fn read_row_table(doc: &Html, fname: &str) -> Result<RawTable> {
    let Some(table) = doc.select(&TABLE).last() else {
        return Ok(RawTable::default());
    };
    let joined = exceptions::joined_cells(fname);

    let mut trs = table.select(&TR);
    let header: Vec<String> = match trs.next() {
        Some(tr) => child_elements(tr, "th")
            .enumerate()
            .map(|(i, th)| {
                let text = cell_value(th, "", fname)
                    .map(|c| c.text().to_string())
                    .unwrap_or_default();
                let text = if text.is_empty() { (i + 1).to_string() } else { text };
                text.split_whitespace().collect::<Vec<_>>().join(" ")
            })
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for tr in trs {
        let mut cells = child_elements(tr, "td")
            .map(|td| cell_value(td, "\n", fname))
            .collect::<Result<Vec<_>>>()?;
        if let Some((sep, width)) = joined {
            cells = split_joined(cells, sep, width, fname)?;
        }
        if cells.len() < header.len() {
            cells.resize(header.len(), Cell::default());
        }
        rows.push(header.iter().cloned().zip(cells).collect());
    }
    Ok(RawTable { header, rows })
}

fn split_joined(cells: Vec<Cell>, sep: char, width: usize, fname: &str) -> Result<Vec<Cell>> {
    if cells.len() != 2 {
        return Err(ArchiveError::JoinedCellCount {
            file: fname.to_string(),
            expected: 2,
            found: cells.len(),
        });
    }
    Ok(cells
        .iter()
        .flat_map(|c| c.text().split(sep))
        .take(width)
        .map(|s| Cell::Text(s.trim().to_string()))
        .collect())
}

fn cell_value(td: ElementRef, sep: &str, fname: &str) -> Result<Cell> {
    let links: Vec<ElementRef> = child_elements(td, "a").collect();
    if let Some(href) = links.first().and_then(|a| a.value().attr("href")) {
        if links.len() != 1 {
            return Err(ArchiveError::AmbiguousLink {
                file: fname.to_string(),
                links: links.len(),
            });
        }
        return Ok(Cell::Link(href.to_string(), leading_text(links[0])));
    }
    if let Some(div) = child_elements(td, "div").next() {
        return Ok(Cell::Text(leading_text(div).unwrap_or_default().trim().to_string()));
    }
    Ok(Cell::Text(joined_text(td, sep)))
}

fn child_elements<'a>(el: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(move |c| c.value().name() == name)
}

/// Text before the element's first child element.
fn leading_text(el: ElementRef) -> Option<String> {
    el.first_child()
        .and_then(|n| n.value().as_text())
        .map(|t| t.to_string())
}

fn joined_text(el: ElementRef, sep: &str) -> String {
    el.text().collect::<Vec<_>>().join(sep).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn details_page(tables: &[&str]) -> String {
        let body: String = tables
            .iter()
            .map(|t| format!("<table>{}</table>", t))
            .collect();
        format!("<html><body>{}</body></html>", body)
    }

    #[test]
    fn detail_tables_keyed_by_position() {
        let html = details_page(&[
            "<tr><td>Recording</td><td>1</td></tr><tr><td>Dialect</td><td>Lowland</td></tr>",
            "<tr><td>Recording</td><td>2</td></tr>\
             <tr><td>Rights of Access</td><td><a href=\"http://example.org/license\">CC</a></td></tr>",
        ]);
        let doc = parse_document("x_record_details.html", &html);
        let md = read_detail_table(&doc, "x_record_details.html").unwrap();
        assert_eq!(md.len(), 2);
        assert_eq!(md[&1]["Dialect"], "Lowland");
        assert_eq!(md[&2]["Rights of Access"], "http://example.org/license");
    }

    #[test]
    fn detail_position_mismatch_fails() {
        let html = details_page(&[
            "<tr><td>Recording</td><td>1</td></tr>",
            "<tr><td>Recording</td><td>3</td></tr>",
        ]);
        let doc = parse_document("x.html", &html);
        let err = read_detail_table(&doc, "x.html").unwrap_err();
        assert!(matches!(err, ArchiveError::PositionMismatch { position: 2, .. }));
    }

    #[test]
    fn detail_language_synonyms_fold() {
        let html = details_page(&["<tr><td>Recording</td><td>1</td></tr><tr><td>Zulu</td><td>yes</td></tr>"]);
        let doc = parse_document("x.html", &html);
        let md = read_detail_table(&doc, "x.html").unwrap();
        assert_eq!(md[&1]["Language"], "yes");
        assert!(!md[&1].contains_key("Zulu"));

        let html = details_page(&[
            "<tr><td>Recording</td><td>1</td></tr><tr><td>Hindi</td><td>a</td></tr>\
             <tr><td>Language</td><td>b</td></tr>",
        ]);
        let doc = parse_document("x.html", &html);
        assert!(matches!(
            read_detail_table(&doc, "x.html"),
            Err(ArchiveError::DuplicateLanguageColumn { .. })
        ));
    }

    #[test]
    fn row_table_uses_last_table_and_pads() {
        let html = r#"<html><body>
            <table><tr><th>Ignored</th></tr><tr><td>x</td></tr></table>
            <table>
              <tr><th>Entry</th><th></th><th>Gloss</th></tr>
              <tr><td>1</td><td><a href="a.wav">play</a></td><td>water</td></tr>
              <tr><td>2</td></tr>
            </table></body></html>"#;
        let doc = parse_document("p.html", html);
        let table = read_row_table(&doc, "p.html").unwrap();
        assert_eq!(table.header, vec!["Entry", "2", "Gloss"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].get("2"), Some(&Cell::Link("a.wav".into(), Some("play".into()))));
        assert_eq!(table.rows[1].text("Gloss"), Some(""));
    }

    #[test]
    fn row_table_repairs_broken_close_tag() {
        let html = "<table><tr><th>Entry</th><th>Gloss</th></tr><tr><td>1<t/d><td>fire</td></tr></table>";
        let doc = parse_document("p.html", html);
        let table = read_row_table(&doc, "p.html").unwrap();
        assert_eq!(table.rows[0].text("Entry"), Some("1"));
        assert_eq!(table.rows[0].text("Gloss"), Some("fire"));
    }

    #[test]
    fn row_table_splits_joined_cells() {
        let html = "<table><tr><th>Entry</th><th>Armenian</th><th>IPA</th><th>English</th></tr>\
                    <tr><td>1\u{a0}ջուր</td><td>dʒur\u{a0}water</td></tr></table>";
        let doc = parse_document("hye_word-list_1973_01.html", html);
        let table = read_row_table(&doc, "hye_word-list_1973_01.html").unwrap();
        let row = &table.rows[0];
        assert_eq!(row.text("Entry"), Some("1"));
        assert_eq!(row.text("IPA"), Some("dʒur"));
        assert_eq!(row.text("English"), Some("water"));
    }

    #[test]
    fn row_serializes_in_column_order() {
        let row: Row = [
            ("Entry".to_string(), Cell::Text("3".into())),
            ("Audio".to_string(), Cell::Link("a.wav".into(), None)),
        ]
        .into_iter()
        .collect();
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"Entry":"3","Audio":["a.wav",null]}"#);
        let back: Row = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
    }
}
