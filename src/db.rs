use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::assemble::Dataset;
use crate::parser::page::Row;

/// Separators of list-valued columns.
const CONTENTS_SEP: &str = "; ";
const MEDIUM_SEP: &str = "|";
const ID_SEP: &str = " ";

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("opening {}", path.display()))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

/// Output tables, dropped and recreated on every write.
const SCHEMA: &str = "
    DROP TABLE IF EXISTS ContributionTable;
    DROP TABLE IF EXISTS FormTable;
    DROP TABLE IF EXISTS ExampleTable;
    DROP TABLE IF EXISTS MediaTable;
    DROP TABLE IF EXISTS ParameterTable;
    DROP TABLE IF EXISTS LanguageTable;

    CREATE TABLE LanguageTable (
        ID            TEXT PRIMARY KEY,
        Name          TEXT NOT NULL,
        Glottocode    TEXT NOT NULL,
        Latitude      REAL,
        Longitude     REAL,
        Macroarea     TEXT,
        ISO639P3code  TEXT,
        Family_Name   TEXT NOT NULL
    );

    CREATE TABLE ParameterTable (
        ID    TEXT PRIMARY KEY,
        Name  TEXT NOT NULL
    );

    CREATE TABLE MediaTable (
        ID            TEXT PRIMARY KEY,
        Name          TEXT NOT NULL,
        Description   TEXT,
        Media_Type    TEXT NOT NULL,
        Download_URL  TEXT NOT NULL,
        size          INTEGER
    );

    CREATE TABLE FormTable (
        ID             TEXT PRIMARY KEY,
        Language_ID    TEXT NOT NULL REFERENCES LanguageTable(ID),
        Parameter_ID   TEXT NOT NULL REFERENCES ParameterTable(ID),
        Form           TEXT NOT NULL,
        original_data  TEXT NOT NULL,
        Scan_IDs       TEXT NOT NULL
    );
    CREATE INDEX idx_form_language ON FormTable(Language_ID);
    CREATE INDEX idx_form_parameter ON FormTable(Parameter_ID);

    CREATE TABLE ExampleTable (
        ID               TEXT PRIMARY KEY,
        Language_ID      TEXT NOT NULL REFERENCES LanguageTable(ID),
        Primary_Text     TEXT NOT NULL,
        Translated_Text  TEXT NOT NULL,
        Speaker          TEXT,
        original_data    TEXT NOT NULL
    );
    CREATE INDEX idx_example_language ON ExampleTable(Language_ID);

    CREATE TABLE ContributionTable (
        ID                         TEXT PRIMARY KEY,
        Name                       TEXT NOT NULL,
        Description                TEXT NOT NULL,
        Position                   INTEGER NOT NULL,
        Language_ID                TEXT NOT NULL REFERENCES LanguageTable(ID),
        Contributor                TEXT,
        contents                   TEXT NOT NULL,
        location                   TEXT,
        date                       TEXT,
        year                       INTEGER,
        rights_of_access           TEXT,
        Media_IDs                  TEXT NOT NULL,
        Form_IDs                   TEXT NOT NULL,
        Text_IDs                   TEXT NOT NULL,
        dialect                    TEXT,
        speakers                   TEXT,
        speaker_name               TEXT,
        speaker_origin             TEXT,
        wordlist_entries           TEXT,
        original_recording_medium  TEXT
    );
    CREATE INDEX idx_contribution_language ON ContributionTable(Language_ID);
";

// ── Output rows ──

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageRow {
    pub id: String,
    pub name: String,
    pub glottocode: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub macroarea: Option<String>,
    pub iso639p3code: Option<String>,
    pub family_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContributionRow {
    pub id: String,
    pub name: String,
    pub description: String,
    pub position: i64,
    pub language_id: String,
    pub contributor: Option<String>,
    pub contents: Vec<String>,
    pub location: Option<String>,
    pub date: Option<String>,
    pub year: Option<i32>,
    pub rights_of_access: Option<String>,
    pub media_ids: Vec<String>,
    pub form_ids: Vec<String>,
    pub text_ids: Vec<String>,
    pub dialect: Option<String>,
    pub speakers: Option<String>,
    pub speaker_name: Option<String>,
    pub speaker_origin: Option<String>,
    pub wordlist_entries: Option<String>,
    pub original_recording_medium: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub media_type: String,
    pub download_url: String,
    pub size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormRow {
    pub id: String,
    pub language_id: String,
    pub parameter_id: String,
    pub form: String,
    pub original_data: Row,
    pub scan_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExampleRow {
    pub id: String,
    pub language_id: String,
    pub primary_text: String,
    pub translated_text: String,
    pub speaker: Option<String>,
    pub original_data: Row,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParameterRow {
    pub id: String,
    pub name: String,
}

// ── Writing ──

/// Replace the whole output with `ds`, in one transaction.
pub fn save_dataset(conn: &Connection, ds: &Dataset) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(SCHEMA)?;
    {
        let mut l_stmt = tx.prepare(
            "INSERT INTO LanguageTable
             (ID, Name, Glottocode, Latitude, Longitude, Macroarea, ISO639P3code, Family_Name)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for l in &ds.languages {
            l_stmt.execute(rusqlite::params![
                l.id, l.name, l.glottocode, l.latitude, l.longitude, l.macroarea,
                l.iso639p3code, l.family_name,
            ])?;
        }

        let mut p_stmt = tx.prepare("INSERT INTO ParameterTable (ID, Name) VALUES (?1, ?2)")?;
        for p in &ds.parameters {
            p_stmt.execute(rusqlite::params![p.id, p.name])?;
        }

        let mut m_stmt = tx.prepare(
            "INSERT INTO MediaTable (ID, Name, Description, Media_Type, Download_URL, size)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for m in &ds.media {
            m_stmt.execute(rusqlite::params![
                m.id, m.name, m.description, m.media_type, m.download_url, m.size,
            ])?;
        }

        let mut f_stmt = tx.prepare(
            "INSERT INTO FormTable (ID, Language_ID, Parameter_ID, Form, original_data, Scan_IDs)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for f in &ds.forms {
            f_stmt.execute(rusqlite::params![
                f.id,
                f.language_id,
                f.parameter_id,
                f.form,
                serde_json::to_string(&f.original_data)?,
                f.scan_ids.join(ID_SEP),
            ])?;
        }

        let mut e_stmt = tx.prepare(
            "INSERT INTO ExampleTable
             (ID, Language_ID, Primary_Text, Translated_Text, Speaker, original_data)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for e in &ds.examples {
            e_stmt.execute(rusqlite::params![
                e.id,
                e.language_id,
                e.primary_text,
                e.translated_text,
                e.speaker,
                serde_json::to_string(&e.original_data)?,
            ])?;
        }

        let mut c_stmt = tx.prepare(
            "INSERT INTO ContributionTable
             (ID, Name, Description, Position, Language_ID, Contributor, contents, location,
              date, year, rights_of_access, Media_IDs, Form_IDs, Text_IDs, dialect, speakers,
              speaker_name, speaker_origin, wordlist_entries, original_recording_medium)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20)",
        )?;
        for c in &ds.contributions {
            c_stmt.execute(rusqlite::params![
                c.id,
                c.name,
                c.description,
                c.position,
                c.language_id,
                c.contributor,
                c.contents.join(CONTENTS_SEP),
                c.location,
                c.date,
                c.year,
                c.rights_of_access,
                c.media_ids.join(ID_SEP),
                c.form_ids.join(ID_SEP),
                c.text_ids.join(ID_SEP),
                c.dialect,
                c.speakers,
                c.speaker_name,
                c.speaker_origin,
                c.wordlist_entries,
                c.original_recording_medium.as_ref().map(|m| m.join(MEDIUM_SEP)),
            ])?;
        }
    }
    tx.commit()?;
    Ok(())
}

// ── Lookups ──

/// Media, form and example ids linked from one contribution.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingLinks {
    pub media_ids: Vec<String>,
    pub form_ids: Vec<String>,
    pub text_ids: Vec<String>,
}

fn split_ids(s: String) -> Vec<String> {
    s.split(ID_SEP)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn fetch_recording_links(conn: &Connection, id: &str) -> Result<Option<RecordingLinks>> {
    let links = conn
        .query_row(
            "SELECT Media_IDs, Form_IDs, Text_IDs FROM ContributionTable WHERE ID = ?1",
            [id],
            |row| {
                Ok(RecordingLinks {
                    media_ids: split_ids(row.get(0)?),
                    form_ids: split_ids(row.get(1)?),
                    text_ids: split_ids(row.get(2)?),
                })
            },
        )
        .optional()?;
    Ok(links)
}

// ── Stats ──

pub struct Stats {
    pub languages: usize,
    pub contributions: usize,
    pub media: usize,
    pub forms: usize,
    pub examples: usize,
    pub parameters: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let count = |table: &str| -> Result<usize> {
        let n: usize =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |r| r.get(0))?;
        Ok(n)
    };
    Ok(Stats {
        languages: count("LanguageTable")?,
        contributions: count("ContributionTable")?,
        media: count("MediaTable")?,
        forms: count("FormTable")?,
        examples: count("ExampleTable")?,
        parameters: count("ParameterTable")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::page::Cell;

    fn dataset() -> Dataset {
        let data: Row = [("Entry".to_string(), Cell::Text("1".into()))].into_iter().collect();
        Dataset {
            languages: vec![LanguageRow {
                id: "ABC".into(),
                name: "Abcish".into(),
                glottocode: "abcd1234".into(),
                latitude: Some(1.5),
                longitude: Some(2.5),
                macroarea: Some("Africa".into()),
                iso639p3code: Some("abc".into()),
                family_name: "Isolate".into(),
            }],
            parameters: vec![ParameterRow {
                id: "water".into(),
                name: "water".into(),
            }],
            forms: vec![FormRow {
                id: "abc_word-list-1".into(),
                language_id: "ABC".into(),
                parameter_id: "water".into(),
                form: "ma".into(),
                original_data: data,
                scan_ids: vec!["a_jpg".into(), "b_jpg".into()],
            }],
            contributions: vec![ContributionRow {
                id: "ABC-1".into(),
                name: "Abcish recording 1".into(),
                description: "Recording of story and word list".into(),
                position: 1,
                language_id: "ABC".into(),
                contributor: None,
                contents: vec!["story".into(), "word list".into()],
                location: None,
                date: None,
                year: None,
                rights_of_access: None,
                media_ids: vec![],
                form_ids: vec!["abc_word-list-1".into()],
                text_ids: vec![],
                dialect: None,
                speakers: None,
                speaker_name: None,
                speaker_origin: None,
                wordlist_entries: None,
                original_recording_medium: Some(vec!["reel tape".into(), "cassette tape".into()]),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn saves_and_reads_back() {
        let conn = Connection::open_in_memory().unwrap();
        save_dataset(&conn, &dataset()).unwrap();

        let s = get_stats(&conn).unwrap();
        assert_eq!((s.languages, s.forms, s.contributions, s.media), (1, 1, 1, 0));

        let (contents, medium): (String, String) = conn
            .query_row(
                "SELECT contents, original_recording_medium FROM ContributionTable",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(contents, "story; word list");
        assert_eq!(medium, "reel tape|cassette tape");

        let (data, scans): (String, String) = conn
            .query_row("SELECT original_data, Scan_IDs FROM FormTable", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(data, r#"{"Entry":"1"}"#);
        assert_eq!(scans, "a_jpg b_jpg");
    }

    #[test]
    fn rewrite_replaces_rows() {
        let conn = Connection::open_in_memory().unwrap();
        save_dataset(&conn, &dataset()).unwrap();
        save_dataset(&conn, &dataset()).unwrap();
        assert_eq!(get_stats(&conn).unwrap().forms, 1);
    }

    #[test]
    fn recording_links_lookup() {
        let conn = Connection::open_in_memory().unwrap();
        save_dataset(&conn, &dataset()).unwrap();
        let links = fetch_recording_links(&conn, "ABC-1").unwrap().unwrap();
        assert_eq!(links.form_ids, ["abc_word-list-1"]);
        assert!(links.media_ids.is_empty());
        assert!(fetch_recording_links(&conn, "ABC-9").unwrap().is_none());
    }
}
