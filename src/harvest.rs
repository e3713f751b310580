//! Harvest stage: read the fetched site cache into one dump per language.
//!
//! For every language directory the index table is merged, by position, with
//! the record details tables, and each wordlist or text page referenced by a
//! recording is read once, in first-reference order.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ArchiveError;
use crate::exceptions;
use crate::inputs::FieldMaps;
use crate::parser::entries::{FieldMap, ENTRY};
use crate::parser::page::{self, Cell, Details, Row};

const INDEX_FILE: &str = "index.html";
const RECORD_DETAILS_SUFFIX: &str = "_record_details.html";
pub const WORDLIST_ENTRIES: &str = "Word List Entries";

/// Index columns holding the scanned word list images of a recording.
const SCAN_COLUMNS: &[&str] = &[
    "Scanned Word List (JPG)",
    "JPG 2",
    "Scanned Word List (TIF)",
    "TIF 2",
];

/// One index row with its record details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingDump {
    pub position: usize,
    pub row: Row,
    pub details: Details,
}

/// Rows of a wordlist or text page plus the scans listed next to its first
/// reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageDump {
    pub fname: String,
    pub scans: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageDump {
    pub code: String,
    pub name: String,
    pub recordings: Vec<RecordingDump>,
    pub pages: Vec<PageDump>,
}

/// Page file name referenced by a `Word List Entries` link, without anchor.
pub fn linked_page(cell: &Cell) -> Option<&str> {
    match cell {
        Cell::Link(href, _) => href.split('#').next(),
        Cell::Text(_) => None,
    }
}

fn read_page(dir: &Path, fname: &str) -> Result<scraper::Html> {
    let path = dir.join(fname);
    let html = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    Ok(page::parse_document(fname, &html))
}

fn record_details(dir: &Path, code: &str) -> Result<BTreeMap<usize, Details>> {
    let mut found: Vec<String> = fs::read_dir(dir)
        .with_context(|| format!("listing {}", dir.display()))?
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|n| n.ends_with(RECORD_DETAILS_SUFFIX))
        .collect();
    found.sort();

    match found.as_slice() {
        [fname] => {
            let doc = read_page(dir, fname)?;
            Ok(page::read_detail_table(&doc, fname)?)
        }
        [] if exceptions::allows_missing_details(code) => Ok(BTreeMap::new()),
        _ => Err(ArchiveError::RecordDetailsCount {
            language: code.to_string(),
            found: found.len(),
        }
        .into()),
    }
}

/// Read one language directory of the site cache.
pub fn harvest_language(dir: &Path) -> Result<LanguageDump> {
    let code = dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("bad language directory {}", dir.display()))?
        .to_string();

    let index = read_page(dir, INDEX_FILE)?;
    let name = page::document_title(&index)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| anyhow!("{}/{} has no title", code, INDEX_FILE))?;
    let mut details = record_details(dir, &code)?;
    let table = page::read_row_table(&index, INDEX_FILE)?;
    if table.rows.is_empty() {
        return Err(ArchiveError::NoRecordings { language: code }.into());
    }

    let mut recordings = Vec::with_capacity(table.rows.len());
    let mut pages: Vec<PageDump> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for (i, mut row) in table.rows.into_iter().enumerate() {
        let position = i + 1;
        if let Some(href) = exceptions::wordlist_link(&code, position) {
            let text = row.get(WORDLIST_ENTRIES).and_then(|c| match c {
                Cell::Link(_, t) => t.clone(),
                Cell::Text(t) => Some(t.clone()).filter(|t| !t.is_empty()),
            });
            row.insert(WORDLIST_ENTRIES, Cell::Link(href.to_string(), text));
        }

        match row.get(WORDLIST_ENTRIES) {
            Some(cell @ Cell::Link(..)) => {
                if let Some(fname) = linked_page(cell).filter(|f| !f.is_empty()) {
                    if seen.insert(fname.to_string()) {
                        let doc = read_page(dir, fname)?;
                        let table = page::read_row_table(&doc, fname)?;
                        let scans = SCAN_COLUMNS
                            .iter()
                            .filter_map(|k| row.get(k).and_then(Cell::target))
                            .map(str::to_string)
                            .collect();
                        debug!(
                            language = %code,
                            page = fname,
                            columns = table.header.len(),
                            rows = table.rows.len(),
                            "read page"
                        );
                        pages.push(PageDump {
                            fname: fname.to_string(),
                            scans,
                            rows: table.rows,
                        });
                    }
                }
            }
            Some(cell) if !cell.is_empty() => {
                return Err(ArchiveError::UnlinkedEntries {
                    language: code,
                    position,
                }
                .into());
            }
            _ => {}
        }

        recordings.push(RecordingDump {
            position,
            details: details.remove(&position).unwrap_or_default(),
            row,
        });
    }

    Ok(LanguageDump {
        code,
        name,
        recordings,
        pages,
    })
}

/// Harvest every language directory under `site`, in sorted order.
pub fn harvest_site(site: &Path) -> Result<Vec<LanguageDump>> {
    let mut dirs: Vec<_> = fs::read_dir(site)
        .with_context(|| format!("listing {}", site.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();

    let pb = ProgressBar::new(dirs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message("index");

    let dumps = dirs
        .par_iter()
        .map(|dir| {
            let dump = harvest_language(dir).with_context(|| format!("harvesting {}", dir.display()));
            pb.inc(1);
            dump
        })
        .collect::<Result<Vec<_>>>()?;
    pb.finish_and_clear();

    let pages: usize = dumps.iter().map(|d| d.pages.len()).sum();
    info!(languages = dumps.len(), pages, "harvested site");
    Ok(dumps)
}

/// Column-role skeletons for every harvested page without a registered
/// field map: each column except `Entry`, with no roles assigned.
pub fn field_template(dumps: &[LanguageDump], registered: &FieldMaps) -> FieldMaps {
    let mut template = FieldMaps::new();
    for dump in dumps {
        for page in &dump.pages {
            let known = registered
                .get(&dump.code)
                .is_some_and(|m| m.contains_key(&page.fname));
            let Some(first) = page.rows.first() else {
                continue;
            };
            if known {
                continue;
            }
            let columns: FieldMap = first
                .keys()
                .filter(|k| *k != ENTRY)
                .map(|k| (k.to_string(), String::new()))
                .collect();
            template
                .entry(dump.code.clone())
                .or_default()
                .insert(page.fname.clone(), columns);
        }
    }
    template
}
