//! Normalisation of free-text recording metadata.
//!
//! Each rule only recognises the "not specified" variants listed here, matched
//! exactly as written. Values outside the lists are kept verbatim; a date
//! without a year is the one case rejected outright.

use std::sync::LazyLock;

use regex::Regex;

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?P<year>[0-9]{4})").unwrap());
static CONTENTS_SEP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" and |, ").unwrap());

const NO_FORM: &[&str] = &[
    "(no transcription)",
    "----",
    "No transcription given",
    "no phonemic transcription given",
    "Transcription illegible",
    "No IPA given",
    "(not on wordlist)",
];

const NO_DIALECT: &[&str] = &[
    "dialect not specified",
    "Dialect not specified",
    "dialects not specified",
    "dialect unknown",
    "dialect unkown",
    "dialect unspecified",
    "Dialect unspecified",
    "N/A",
    "not specified",
    "Speaker dialect not specified",
    "unknown",
];

/// Speaker fields are matched as substrings of these phrases.
const NO_SPEAKERS: &str = "unknown n/a N/A";
const NO_SPEAKER_NAME: &str = "Speaker not identified Speaker name unspecified N/A unknown Unknown";

const NO_SPEAKER_ORIGIN: &[&str] = &[
    "Speaker origin not specified",
    "Speakers' origins not specified",
    "Speaker origins not specified",
    "Speaker origins unknown",
    "speaker origin unknown",
    "Speaker origin unknown",
    "Speaker Origin Unknown",
    "Speaker origin unspecified",
    "not specified",
    "unknown",
];

const NO_FIELDWORKER: &[&str] = &[
    "Fieldworker not specified",
    "fieldworker(s) not specified",
    "Fieldworker(s) unspecified",
    "N/A",
    "not specified",
    "unknown",
    "Unknown",
    "Unspecified",
];

const NO_DATE: &[&str] = &[
    "N/A",
    "not specified",
    "Recording date(s) not given",
    "Date unspecified",
];

/// Spelling variants of recording media. An empty target list means the
/// medium is unknown.
const MEDIA: &[(&str, &[&str])] = &[
    ("32K DAT", &["DAT tape, 32 kHz"]),
    ("48K DAT", &["DAT tape, 48 kHz"]),
    ("casette tape", &["cassette tape"]),
    ("Casette tape", &["cassette tape"]),
    ("Casette Tape", &["cassette tape"]),
    ("cassette", &["cassette tape"]),
    ("Cassette tape", &["cassette tape"]),
    ("Cassette Tape", &["cassette tape"]),
    ("reel tape", &["reel tape"]),
    ("Reel tape", &["reel tape"]),
    ("Reel Tape", &["reel tape"]),
    ("Reel Tape, Cassette Tape", &["reel tape", "cassette tape"]),
    ("unknown", &[]),
    ("Unknown", &[]),
];

fn present(c: Option<&str>) -> Option<&str> {
    c.filter(|s| !s.is_empty())
}

fn unless_listed(c: Option<&str>, absent: &[&str]) -> Option<String> {
    present(c)
        .filter(|s| !absent.contains(s))
        .map(str::to_string)
}

/// Placeholder texts standing in for a missing transcription become `NA`.
pub fn norm_form(c: &str) -> String {
    if NO_FORM.contains(&c) {
        "NA".to_string()
    } else {
        c.to_string()
    }
}

pub fn norm_dialect(c: Option<&str>) -> Option<String> {
    unless_listed(c, NO_DIALECT)
}

pub fn norm_speakers(c: Option<&str>) -> Option<String> {
    present(c)
        .filter(|s| !NO_SPEAKERS.contains(s))
        .map(str::to_string)
}

pub fn norm_speaker_name(c: Option<&str>) -> Option<String> {
    present(c)
        .filter(|s| !NO_SPEAKER_NAME.contains(s))
        .map(str::to_string)
}

pub fn norm_speaker_origin(c: Option<&str>) -> Option<String> {
    unless_listed(c, NO_SPEAKER_ORIGIN)
}

pub fn norm_fieldworker(c: Option<&str>) -> Option<String> {
    unless_listed(c, NO_FIELDWORKER)
}

pub fn norm_location(c: Option<&str>) -> Option<String> {
    present(c)
        .filter(|s| s.to_lowercase() != "unknown")
        .map(str::to_string)
}

/// Map the original recording medium onto canonical medium tags.
pub fn norm_medium(c: Option<&str>) -> Option<Vec<String>> {
    let c = present(c)?;
    match MEDIA.iter().find(|(k, _)| *k == c) {
        Some((_, [])) => None,
        Some((_, tags)) => Some(tags.iter().map(|t| t.to_string()).collect()),
        None => Some(vec![c.to_string()]),
    }
}

/// Split recording contents into a sorted list of lowercase genre names.
pub fn norm_contents(c: &str) -> Vec<String> {
    let lower = c.to_lowercase();
    let mut parts: Vec<String> = CONTENTS_SEP_RE
        .split(&lower)
        .map(|w| w.replace("wordlist", "word list"))
        .collect();
    parts.sort();
    parts
}

/// Returns the date text and the first four-digit year found in it. A date
/// without a year is returned as the error.
pub fn norm_date(c: Option<&str>) -> Result<(Option<String>, Option<i32>), String> {
    let Some(c) = present(c) else {
        return Ok((None, None));
    };
    if NO_DATE.contains(&c) || c.to_lowercase().ends_with("unknown") {
        return Ok((None, None));
    }
    let year = YEAR_RE
        .captures(c)
        .and_then(|caps| caps["year"].parse::<i32>().ok())
        .ok_or_else(|| c.to_string())?;
    Ok((Some(c.to_string()), (year != 0).then_some(year)))
}
