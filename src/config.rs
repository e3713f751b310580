use std::path::{Path, PathBuf};

/// Environment variable naming the dataset directory when `--root` is absent.
pub const ROOT_ENV: &str = "UCLA_ARCHIVE_DIR";

const SITE_DIR: &str = "raw/site";
const RECORDINGS_PATH: &str = "raw/recordings.json";
const FIELDS_PATH: &str = "etc/wordlist_fields.json";
const FIELDS_TEMPLATE_PATH: &str = "etc/wordlist_fields.template.json";
const URLS_PATH: &str = "etc/urls.json";
const CATALOG_PATH: &str = "etc/languoids.json";
const DB_PATH: &str = "cldf/ucla.sqlite";

/// Locations of every input and output of the pipeline under one dataset root.
#[derive(Debug, Clone)]
pub struct Paths {
    pub site: PathBuf,
    pub recordings: PathBuf,
    pub fields: PathBuf,
    pub fields_template: PathBuf,
    pub urls: PathBuf,
    pub catalog: PathBuf,
    pub db: PathBuf,
}

impl Paths {
    pub fn new(root: &Path) -> Self {
        Self {
            site: root.join(SITE_DIR),
            recordings: root.join(RECORDINGS_PATH),
            fields: root.join(FIELDS_PATH),
            fields_template: root.join(FIELDS_TEMPLATE_PATH),
            urls: root.join(URLS_PATH),
            catalog: root.join(CATALOG_PATH),
            db: root.join(DB_PATH),
        }
    }

    /// `root` if given, else `$UCLA_ARCHIVE_DIR`, else the working directory.
    pub fn resolve(root: Option<PathBuf>) -> Self {
        let root = root
            .or_else(|| std::env::var_os(ROOT_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::new(&root)
    }
}
