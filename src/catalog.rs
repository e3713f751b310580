//! Language catalog lookup: canonical identity, coordinates and family of the
//! archive's language directories.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{ArchiveError, Result};
use crate::inputs;

/// Archive directory codes that are neither a glottocode nor an ISO code.
const OVERRIDES: &[(&str, &str)] = &[
    ("ALE_EASTERN", "east2533"),
    ("ALE_WESTERN", "west2616"),
    ("Gikuyu", "kiku1240"),
    ("KOR_CHEJU", "jeju1234"),
    ("EST", "esto1258"),
    ("PRV", "occi1239"),
    ("BNH", "jama1261"),
    ("blu", "hmon1264"),
];

const ISOLATE: &str = "Isolate";

#[derive(Debug, Clone, Deserialize)]
pub struct LineageNode {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Languoid {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub iso: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub macroareas: Vec<String>,
    /// Ancestors, root family first.
    #[serde(default)]
    pub lineage: Vec<LineageNode>,
}

impl Languoid {
    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn family_name(&self) -> &str {
        self.lineage.first().map_or(ISOLATE, |n| n.name.as_str())
    }

    pub fn macroarea(&self) -> Option<&str> {
        self.macroareas.first().map(String::as_str)
    }
}

/// Languoids indexed by glottocode and, where present, ISO 639-3 code.
#[derive(Debug, Default)]
pub struct Catalog {
    languoids: Vec<Languoid>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(languoids: Vec<Languoid>) -> Self {
        let mut index = HashMap::new();
        for (i, l) in languoids.iter().enumerate() {
            index.insert(l.id.clone(), i);
            if let Some(iso) = l.iso.as_ref().filter(|s| !s.is_empty()) {
                index.insert(iso.clone(), i);
            }
        }
        Self { languoids, index }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let languoids: Vec<Languoid> = inputs::load_json(path)?;
        Ok(Self::new(languoids))
    }

    pub fn len(&self) -> usize {
        self.languoids.len()
    }

    pub fn get(&self, key: &str) -> Option<&Languoid> {
        self.index.get(key).map(|&i| &self.languoids[i])
    }

    /// Catalog entry for an archive directory code.
    pub fn resolve(&self, code: &str) -> Result<&Languoid> {
        let key = match OVERRIDES.iter().find(|(c, _)| *c == code) {
            Some((_, glottocode)) => glottocode.to_string(),
            None => code.to_lowercase(),
        };
        self.get(&key)
            .ok_or_else(|| ArchiveError::UnknownLanguage(code.to_string()))
    }

    /// The languoid itself if it has coordinates, else its nearest ancestor
    /// that does.
    pub fn geography<'a>(&'a self, languoid: &'a Languoid) -> Result<&'a Languoid> {
        if languoid.has_coordinates() {
            return Ok(languoid);
        }
        languoid
            .lineage
            .iter()
            .rev()
            .filter_map(|node| self.get(&node.id))
            .find(|l| l.has_coordinates())
            .ok_or_else(|| ArchiveError::NoCoordinates {
                glottocode: languoid.id.clone(),
                name: languoid.name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn languoid(id: &str, iso: Option<&str>, coords: Option<(f64, f64)>, lineage: &[&str]) -> Languoid {
        Languoid {
            id: id.to_string(),
            name: format!("Name of {}", id),
            iso: iso.map(str::to_string),
            latitude: coords.map(|c| c.0),
            longitude: coords.map(|c| c.1),
            macroareas: vec!["Africa".to_string()],
            lineage: lineage
                .iter()
                .map(|l| LineageNode {
                    id: l.to_string(),
                    name: format!("Name of {}", l),
                })
                .collect(),
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            languoid("fam1234", None, None, &[]),
            languoid("grou1234", None, Some((1.0, 2.0)), &["fam1234"]),
            languoid("dial1234", None, None, &["fam1234", "grou1234", "abcd1234"]),
            languoid("abcd1234", Some("abc"), Some((5.0, 6.0)), &["fam1234", "grou1234"]),
            languoid("esto1258", Some("ekk"), Some((58.0, 25.0)), &["uralic1"]),
        ])
    }

    #[test]
    fn resolves_by_iso_and_override() {
        let c = catalog();
        assert_eq!(c.resolve("ABC").unwrap().id, "abcd1234");
        assert_eq!(c.resolve("EST").unwrap().id, "esto1258");
        assert!(matches!(c.resolve("XYZ"), Err(ArchiveError::UnknownLanguage(_))));
    }

    #[test]
    fn geography_walks_to_nearest_ancestor() {
        let c = catalog();
        let dialect = c.get("dial1234").unwrap();
        assert_eq!(c.geography(dialect).unwrap().id, "abcd1234");
        let family = c.get("fam1234").unwrap();
        match c.geography(family) {
            Err(ArchiveError::NoCoordinates { glottocode, name }) => {
                assert_eq!((glottocode.as_str(), name.as_str()), ("fam1234", "Name of fam1234"));
            }
            other => panic!("unexpected {:?}", other.map(|l| &l.id)),
        }
    }

    #[test]
    fn family_name_from_root() {
        let c = catalog();
        assert_eq!(c.get("abcd1234").unwrap().family_name(), "Name of fam1234");
        assert_eq!(c.get("fam1234").unwrap().family_name(), "Isolate");
    }
}
