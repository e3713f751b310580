mod assemble;
mod catalog;
mod config;
mod db;
mod error;
mod exceptions;
mod harvest;
mod inputs;
mod parser;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;

use crate::assemble::Sources;
use crate::catalog::Catalog;
use crate::config::Paths;
use crate::harvest::LanguageDump;

#[derive(Parser)]
#[command(name = "ucla_archive", about = "UCLA Phonetics Lab Archive to Wordlist dataset converter")]
struct Cli {
    /// Dataset directory (default: $UCLA_ARCHIVE_DIR or the working directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read the fetched site into raw/recordings.json
    Index,
    /// Assemble the dataset from raw/recordings.json into SQLite
    Build {
        /// Skip languages that fail instead of aborting the build
        #[arg(long)]
        keep_going: bool,
    },
    /// Index + build in one pipeline
    Run {
        /// Skip languages that fail instead of aborting the build
        #[arg(long)]
        keep_going: bool,
    },
    /// Show row counts of the output tables
    Stats,
    /// Show the media, form and example ids linked from one recording
    Recording {
        /// Contribution id, e.g. "ABC-1"
        id: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let paths = Paths::resolve(cli.root);

    let result = match cli.command {
        Commands::Index => index(&paths).map(|_| ()),
        Commands::Build { keep_going } => {
            let dumps: Vec<LanguageDump> = inputs::load_json(&paths.recordings)?;
            build(&paths, &dumps, keep_going)
        }
        Commands::Run { keep_going } => {
            let dumps = index(&paths)?;
            build(&paths, &dumps, keep_going)
        }
        Commands::Stats => {
            let conn = db::connect(&paths.db)?;
            let s = db::get_stats(&conn).context("no dataset yet, run 'build' first")?;
            println!("Languages:     {}", s.languages);
            println!("Contributions: {}", s.contributions);
            println!("Media:         {}", s.media);
            println!("Forms:         {}", s.forms);
            println!("Examples:      {}", s.examples);
            println!("Parameters:    {}", s.parameters);
            Ok(())
        }
        Commands::Recording { id } => {
            let conn = db::connect(&paths.db)?;
            let Some(links) = db::fetch_recording_links(&conn, &id)? else {
                bail!("no recording {:?}", id);
            };
            println!("Media:    {}", links.media_ids.join(" "));
            println!("Forms:    {}", links.form_ids.join(" "));
            println!("Examples: {}", links.text_ids.join(" "));
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Harvest the site cache, dump it, and refresh the field map template.
fn index(paths: &Paths) -> anyhow::Result<Vec<LanguageDump>> {
    let dumps = harvest::harvest_site(&paths.site)?;
    inputs::save_json(&paths.recordings, &dumps)?;

    let registered = if paths.fields.exists() {
        inputs::load_field_maps(&paths.fields)?
    } else {
        Default::default()
    };
    let template = harvest::field_template(&dumps, &registered);
    inputs::save_json(&paths.fields_template, &template)?;

    let recordings: usize = dumps.iter().map(|d| d.recordings.len()).sum();
    println!(
        "Indexed {} languages, {} recordings ({} pages without a field map).",
        dumps.len(),
        recordings,
        template.values().map(|m| m.len()).sum::<usize>(),
    );
    Ok(dumps)
}

fn build(paths: &Paths, dumps: &[LanguageDump], keep_going: bool) -> anyhow::Result<()> {
    let catalog = Catalog::load(&paths.catalog)?;
    let fields = inputs::load_field_maps(&paths.fields)?;
    let media = inputs::load_media_listing(&paths.urls)?;
    info!(languoids = catalog.len(), media = media.len(), "loaded catalog and URL listing");

    let sources = Sources {
        catalog: &catalog,
        fields: &fields,
        media: &media,
    };
    let ds = assemble::assemble(dumps, &sources, keep_going)?;

    let conn = db::connect(&paths.db)?;
    db::save_dataset(&conn, &ds)?;
    println!(
        "Saved {} languages, {} contributions, {} forms, {} examples, {} media, {} parameters.",
        ds.languages.len(),
        ds.contributions.len(),
        ds.forms.len(),
        ds.examples.len(),
        ds.media.len(),
        ds.parameters.len(),
    );
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
