//! Assembly stage: turn harvested language dumps into the rows of the output
//! tables.
//!
//! Languages are assembled independently (and in parallel); their rows are
//! merged in directory order afterwards, which is where media files are
//! deduplicated and concepts are pooled across languages.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tracing::{debug, info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::catalog::Catalog;
use crate::db::{ContributionRow, ExampleRow, FormRow, LanguageRow, MediaRow, ParameterRow};
use crate::error::{ArchiveError, Result};
use crate::harvest::{linked_page, LanguageDump, RecordingDump, WORDLIST_ENTRIES};
use crate::inputs::{FieldMaps, MediaListing};
use crate::parser::entries::extract_entries;
use crate::parser::linker::linked_entries;
use crate::parser::normalize::{
    norm_contents, norm_date, norm_dialect, norm_fieldworker, norm_form, norm_location,
    norm_medium, norm_speaker_name, norm_speaker_origin, norm_speakers,
};
use crate::parser::page::Cell;

/// File name fragments of pages that hold elicited words rather than text.
const WORDLIST_CUES: &[&str] = &["word-list", "ear-training", "sounds"];

const NO_PARAMETER: &str = "NA";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Wav,
    Mp3,
    Jpg,
    Tif,
}

impl MediaKind {
    fn mime_type(self) -> &'static str {
        match self {
            MediaKind::Wav => "audio/x-wav",
            MediaKind::Mp3 => "audio/mpeg",
            MediaKind::Jpg => "image/jpeg",
            MediaKind::Tif => "image/tiff",
        }
    }

    /// Detail fields describing file quality, first present one wins.
    fn quality_keys(self) -> &'static [&'static str] {
        match self {
            MediaKind::Wav => &["WAV Digitization Quality"],
            MediaKind::Mp3 => &["MP3 Bit Rate"],
            MediaKind::Jpg => &["JPG Quality", "JPG Image Quality"],
            MediaKind::Tif => &["TIFF Image Quality"],
        }
    }
}

/// Index columns linking media files, in output order.
const MEDIA_SLOTS: &[(&str, MediaKind)] = &[
    ("WAV", MediaKind::Wav),
    ("MP3", MediaKind::Mp3),
    ("Scanned Word List (JPG)", MediaKind::Jpg),
    ("Scanned Word List (TIF)", MediaKind::Tif),
    ("JPG 2", MediaKind::Jpg),
    ("TIF 2", MediaKind::Tif),
];

/// Read-only lookups shared by every language.
pub struct Sources<'a> {
    pub catalog: &'a Catalog,
    pub fields: &'a FieldMaps,
    pub media: &'a MediaListing,
}

/// How many recordings set each index column and detail field.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Diagnostics {
    pub fields: BTreeMap<String, usize>,
}

impl Diagnostics {
    fn record(&mut self, rec: &RecordingDump) {
        for (k, v) in rec.row.iter() {
            if !v.is_empty() {
                *self.fields.entry(k.to_string()).or_default() += 1;
            }
        }
        for (k, v) in &rec.details {
            if !v.is_empty() {
                *self.fields.entry(format!("details/{}", k)).or_default() += 1;
            }
        }
    }

    pub fn merge(&mut self, other: Diagnostics) {
        for (k, n) in other.fields {
            *self.fields.entry(k).or_default() += n;
        }
    }
}

/// Everything one language contributes to the output.
#[derive(Debug)]
pub struct LanguageRows {
    pub language: LanguageRow,
    pub contributions: Vec<ContributionRow>,
    pub forms: Vec<FormRow>,
    pub examples: Vec<ExampleRow>,
    pub media: Vec<MediaRow>,
    pub concepts: BTreeMap<String, BTreeSet<String>>,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Default)]
pub struct Dataset {
    pub languages: Vec<LanguageRow>,
    pub contributions: Vec<ContributionRow>,
    pub media: Vec<MediaRow>,
    pub forms: Vec<FormRow>,
    pub examples: Vec<ExampleRow>,
    pub parameters: Vec<ParameterRow>,
    pub diagnostics: Diagnostics,
}

/// Lowercased ASCII letters and digits of `s` after canonical decomposition,
/// so accented letters fold to their base letter; everything else is dropped.
pub fn slug(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn media_id(fname: &str) -> String {
    fname.replace('.', "_")
}

fn is_wordlist(fname: &str) -> bool {
    WORDLIST_CUES.iter().any(|cue| fname.contains(cue))
}

/// Whether the URL listing has a download URL for `fname`.
fn served(sources: &Sources, code: &str, fname: &str) -> bool {
    sources
        .media
        .get(&format!("{}/{}", code, fname))
        .is_some_and(|m| m.url.is_some())
}

type Linkable = HashMap<String, Vec<(String, u32)>>;

pub fn assemble_language(dump: &LanguageDump, sources: &Sources) -> Result<LanguageRows> {
    let code = dump.code.as_str();
    let glang = sources.catalog.resolve(code)?;
    let geo = sources.catalog.geography(glang)?;
    let language = LanguageRow {
        id: code.to_string(),
        name: dump.name.clone(),
        glottocode: glang.id.clone(),
        latitude: geo.latitude,
        longitude: geo.longitude,
        macroarea: glang.macroarea().map(str::to_string),
        iso639p3code: glang.iso.clone(),
        family_name: glang.family_name().to_string(),
    };

    let mut forms = Vec::new();
    let mut examples = Vec::new();
    let mut concepts: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut wordlist_ids = Linkable::new();
    let mut text_ids = Linkable::new();
    let page_fields = sources.fields.get(code);
    for page in &dump.pages {
        let fields = page_fields
            .and_then(|m| m.get(&page.fname))
            .ok_or_else(|| ArchiveError::UnregisteredPage {
                language: code.to_string(),
                file: page.fname.clone(),
            })?;
        let entries = extract_entries(&page.fname, &page.rows, fields)?;
        debug!(language = code, page = %page.fname, entries = entries.len(), "extracted");

        if is_wordlist(&page.fname) {
            let scan_ids: Vec<String> = page
                .scans
                .iter()
                .filter(|s| served(sources, code, s))
                .map(|s| media_id(s))
                .collect();
            let ids = wordlist_ids.entry(page.fname.clone()).or_default();
            for e in entries {
                let pid = match slug(&e.gloss) {
                    s if s.is_empty() => NO_PARAMETER.to_string(),
                    s => s,
                };
                concepts.entry(pid.clone()).or_default().insert(e.gloss.clone());
                ids.push((e.id.clone(), e.number));
                forms.push(FormRow {
                    id: e.id,
                    language_id: code.to_string(),
                    parameter_id: pid,
                    form: norm_form(&e.form),
                    original_data: e.data,
                    scan_ids: scan_ids.clone(),
                });
            }
        } else {
            let ids = text_ids.entry(page.fname.clone()).or_default();
            for e in entries {
                ids.push((e.id.clone(), e.number));
                examples.push(ExampleRow {
                    id: e.id,
                    language_id: code.to_string(),
                    primary_text: e.form,
                    translated_text: e.gloss,
                    speaker: e.data.text("Speaker").map(str::to_string),
                    original_data: e.data,
                });
            }
        }
    }

    let mut contributions = Vec::with_capacity(dump.recordings.len());
    let mut media = Vec::new();
    let mut seen_media: HashSet<String> = HashSet::new();
    let mut diagnostics = Diagnostics::default();
    for rec in &dump.recordings {
        diagnostics.record(rec);
        let (form_ids, example_ids) = recording_entries(code, rec, &wordlist_ids, &text_ids)?;

        let detail = |k: &str| rec.details.get(k).map(String::as_str);
        let contents = norm_contents(detail("Recording Contents").unwrap_or(""));
        let (date, year) =
            norm_date(detail("Recording Date")).map_err(|value| ArchiveError::DateWithoutYear {
                language: code.to_string(),
                position: rec.position,
                value,
            })?;

        let mut media_ids = Vec::new();
        for (column, kind) in MEDIA_SLOTS {
            let Some(fname) = rec.row.get(column).and_then(Cell::target) else {
                continue;
            };
            let source = sources
                .media
                .get(&format!("{}/{}", code, fname))
                .ok_or_else(|| ArchiveError::UnlistedMedia {
                    language: code.to_string(),
                    file: fname.to_string(),
                })?;
            let Some(url) = &source.url else {
                warn!(language = code, file = fname, "media file not served, skipping");
                continue;
            };
            media_ids.push(media_id(fname));
            if seen_media.insert(fname.to_string()) {
                media.push(MediaRow {
                    id: media_id(fname),
                    name: fname.to_string(),
                    description: kind
                        .quality_keys()
                        .iter()
                        .find_map(|k| rec.details.get(*k).cloned()),
                    media_type: kind.mime_type().to_string(),
                    download_url: url.clone(),
                    size: source.size,
                });
            }
        }

        contributions.push(ContributionRow {
            id: format!("{}-{}", code, rec.position),
            name: format!("{} recording {}", dump.name, rec.position),
            description: format!("Recording of {}", contents.join(" and ")),
            position: rec.position as i64,
            language_id: code.to_string(),
            contributor: norm_fieldworker(detail("Fieldworkers")),
            contents,
            location: norm_location(detail("Recording Location")),
            date,
            year,
            rights_of_access: detail("Rights of Access").map(str::to_string),
            media_ids,
            form_ids,
            text_ids: example_ids,
            dialect: norm_dialect(detail("Dialect")),
            speakers: norm_speakers(detail("Speakers")),
            speaker_name: norm_speaker_name(detail("Speaker Name")),
            speaker_origin: norm_speaker_origin(detail("Speaker Origin")),
            wordlist_entries: detail("Unicode Word List Entries").map(str::to_string),
            original_recording_medium: norm_medium(detail("Original Recording Medium")),
        });
    }

    Ok(LanguageRows {
        language,
        contributions,
        forms,
        examples,
        media,
        concepts,
        diagnostics,
    })
}

/// Form ids and example ids a recording's `Word List Entries` link refers to.
fn recording_entries(
    code: &str,
    rec: &RecordingDump,
    wordlist_ids: &Linkable,
    text_ids: &Linkable,
) -> Result<(Vec<String>, Vec<String>)> {
    let Some(cell) = rec.row.get(WORDLIST_ENTRIES).filter(|c| !c.is_empty()) else {
        return Ok((Vec::new(), Vec::new()));
    };
    let unlinked = || ArchiveError::UnlinkedEntries {
        language: code.to_string(),
        position: rec.position,
    };
    let fname = linked_page(cell).ok_or_else(unlinked)?;
    let Cell::Link(_, Some(range)) = cell else {
        return Err(unlinked());
    };

    match wordlist_ids.get(fname) {
        Some(items) => Ok((linked_entries(fname, range, items)?, Vec::new())),
        None => {
            let items = text_ids.get(fname).map(Vec::as_slice).unwrap_or(&[]);
            Ok((Vec::new(), linked_entries(fname, range, items)?))
        }
    }
}

impl Dataset {
    /// Merge per-language rows in the given order. Media files keep their
    /// first occurrence; concepts are pooled by id.
    pub fn from_languages(parts: Vec<LanguageRows>) -> Self {
        let mut ds = Dataset::default();
        let mut seen_media: HashSet<String> = HashSet::new();
        let mut concepts: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for part in parts {
            ds.languages.push(part.language);
            ds.contributions.extend(part.contributions);
            ds.forms.extend(part.forms);
            ds.examples.extend(part.examples);
            ds.media
                .extend(part.media.into_iter().filter(|m| seen_media.insert(m.name.clone())));
            for (pid, glosses) in part.concepts {
                concepts.entry(pid).or_default().extend(glosses);
            }
            ds.diagnostics.merge(part.diagnostics);
        }
        ds.parameters = concepts
            .into_iter()
            .map(|(id, glosses)| ParameterRow {
                id,
                name: glosses.into_iter().collect::<Vec<_>>().join(" | "),
            })
            .collect();
        ds
    }

    /// Every id a row refers to must exist in the table it points into.
    pub fn check_integrity(&self) -> Result<()> {
        fn ids<'a, T>(rows: &'a [T], id: impl Fn(&'a T) -> &'a str) -> HashSet<&'a str> {
            rows.iter().map(id).collect()
        }
        fn require(known: &HashSet<&str>, table: &'static str, id: &str, target: &str) -> Result<()> {
            if known.contains(target) {
                Ok(())
            } else {
                Err(ArchiveError::DanglingReference {
                    table,
                    id: id.to_string(),
                    target: target.to_string(),
                })
            }
        }

        let languages = ids(&self.languages, |r| r.id.as_str());
        let forms = ids(&self.forms, |r| r.id.as_str());
        let examples = ids(&self.examples, |r| r.id.as_str());
        let media = ids(&self.media, |r| r.id.as_str());
        let parameters = ids(&self.parameters, |r| r.id.as_str());

        for c in &self.contributions {
            require(&languages, "ContributionTable", &c.id, &c.language_id)?;
            for t in &c.form_ids {
                require(&forms, "ContributionTable", &c.id, t)?;
            }
            for t in &c.text_ids {
                require(&examples, "ContributionTable", &c.id, t)?;
            }
            for t in &c.media_ids {
                require(&media, "ContributionTable", &c.id, t)?;
            }
        }
        for f in &self.forms {
            require(&languages, "FormTable", &f.id, &f.language_id)?;
            require(&parameters, "FormTable", &f.id, &f.parameter_id)?;
            for t in &f.scan_ids {
                require(&media, "FormTable", &f.id, t)?;
            }
        }
        for e in &self.examples {
            require(&languages, "ExampleTable", &e.id, &e.language_id)?;
        }
        Ok(())
    }
}

/// Assemble every language and merge the results. With `keep_going` a
/// language that fails is logged and left out; otherwise the first failure
/// aborts the whole build.
pub fn assemble(dumps: &[LanguageDump], sources: &Sources, keep_going: bool) -> anyhow::Result<Dataset> {
    let pb = ProgressBar::new(dumps.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message("build");

    let results: Vec<_> = dumps
        .par_iter()
        .map(|dump| {
            let rows = assemble_language(dump, sources);
            pb.inc(1);
            rows
        })
        .collect();
    pb.finish_and_clear();

    let mut parts = Vec::with_capacity(results.len());
    for (dump, result) in dumps.iter().zip(results) {
        match result {
            Ok(rows) => parts.push(rows),
            Err(e) if keep_going => warn!(language = %dump.code, error = %e, "skipping language"),
            Err(e) => return Err(e).with_context(|| format!("assembling {}", dump.code)),
        }
    }

    let ds = Dataset::from_languages(parts);
    ds.check_integrity()?;
    info!(
        languages = ds.languages.len(),
        contributions = ds.contributions.len(),
        forms = ds.forms.len(),
        examples = ds.examples.len(),
        media = ds.media.len(),
        parameters = ds.parameters.len(),
        "assembled dataset"
    );
    for (field, n) in &ds.diagnostics.fields {
        debug!(field = %field, recordings = n, "field usage");
    }
    Ok(ds)
}
