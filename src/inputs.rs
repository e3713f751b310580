//! Prepared JSON inputs: page field maps and the media URL listing.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::parser::entries::FieldMap;

/// Language code → page file name → column roles.
pub type FieldMaps = BTreeMap<String, BTreeMap<String, FieldMap>>;

/// Where a media file can be downloaded from. A `None` url marks a file the
/// site links to but does not serve.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaSource {
    pub url: Option<String>,
    pub size: Option<i64>,
}

/// `"<LANG>/<file>"` → download location.
pub type MediaListing = BTreeMap<String, MediaSource>;

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

pub fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

pub fn load_field_maps(path: &Path) -> Result<FieldMaps> {
    load_json(path)
}

/// Entries are `[url, size, ...]` arrays; trailing checksum columns are ignored.
pub fn load_media_listing(path: &Path) -> Result<MediaListing> {
    let raw: BTreeMap<String, Vec<Value>> = load_json(path)?;
    Ok(raw
        .into_iter()
        .map(|(key, values)| (key, media_source(&values)))
        .collect())
}

fn media_source(values: &[Value]) -> MediaSource {
    MediaSource {
        url: values.first().and_then(Value::as_str).map(str::to_string),
        size: values.get(1).and_then(Value::as_i64),
    }
}
