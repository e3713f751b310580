use thiserror::Error;

/// The archive deviated from every layout variant catalogued so far.
///
/// Each variant names the file (or language directory) and the offending
/// value so the case can be triaged and, if it is a one-off, added to the
/// exceptions table.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("{file}: table {position} declares itself as recording {declared}")]
    PositionMismatch {
        file: String,
        position: usize,
        declared: String,
    },

    #[error("{file}: detail table {position} has no Recording field")]
    MissingRecordingField { file: String, position: usize },

    #[error("{file}: detail row has {cells} cells, expected a key/value pair")]
    MalformedDetailRow { file: String, cells: usize },

    #[error("{file}: Rights of Access cell has no link")]
    MissingRightsLink { file: String },

    #[error("{file}: column {column:?} folds into Language, which is already present")]
    DuplicateLanguageColumn { file: String, column: String },

    #[error("{file}: expected {expected} joined cells, found {found}")]
    JoinedCellCount {
        file: String,
        expected: usize,
        found: usize,
    },

    #[error("{file}: cell holds {links} links, expected one")]
    AmbiguousLink { file: String, links: usize },

    #[error("{language}: expected one record details page, found {found}")]
    RecordDetailsCount { language: String, found: usize },

    #[error("{language}: index lists no recordings")]
    NoRecordings { language: String },

    #[error("{file}: no field map registered for {language}")]
    UnregisteredPage { language: String, file: String },

    #[error("{file}: field map must designate exactly one {role} column, found {found}")]
    FieldMapRole {
        file: String,
        role: &'static str,
        found: usize,
    },

    #[error("{file}: row {row} has no {column:?} column")]
    MissingColumn {
        file: String,
        row: usize,
        column: String,
    },

    #[error("{file}: entry number {value:?} is not an integer")]
    BadEntryNumber { file: String, value: String },

    #[error("{file}: fractional entry {value:?} has no preceding entry")]
    OrphanFraction { file: String, value: String },

    #[error("{file}: cannot parse range {range:?}")]
    BadRange { file: String, range: String },

    #[error("{file}: range {range:?} refers to entries, but none were extracted")]
    NoLinkedEntries { file: String, range: String },

    #[error("{language} recording {position}: Word List Entries is not a link")]
    UnlinkedEntries { language: String, position: usize },

    #[error("{language} recording {position}: no year in recording date {value:?}")]
    DateWithoutYear {
        language: String,
        position: usize,
        value: String,
    },

    #[error("no catalog entry for language code {0:?}")]
    UnknownLanguage(String),

    #[error("{name} ({glottocode}): neither the language nor any ancestor has coordinates")]
    NoCoordinates { glottocode: String, name: String },

    #[error("{language}: media file {file:?} is missing from the URL listing")]
    UnlistedMedia { language: String, file: String },

    #[error("{table} {id}: dangling reference to {target}")]
    DanglingReference {
        table: &'static str,
        id: String,
        target: String,
    },
}

pub type Result<T> = std::result::Result<T, ArchiveError>;
