mod catalog;
mod database;
mod error;
mod ingest;
mod present;
mod utils;

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::catalog::Catalog;
use crate::database::repo::Store;
use crate::error::CatalogError;
use crate::ingest::scanner::FsScanner;
use crate::present::{report, table};
use crate::utils::config::{self, Settings};
use crate::utils::opener;

#[derive(Parser, Debug)]
#[command(author, version, about = "Index, tag and find your documents", long_about = None)]
struct Args {
    /// Config file to use instead of $XDG_CONFIG_HOME/clidms/config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a config file
    Init {
        /// Directory holding your documents
        #[arg(long)]
        documents: PathBuf,
        /// Directory for the catalog database
        #[arg(long)]
        data: PathBuf,
        /// Accepted extensions, comma separated
        #[arg(long, value_delimiter = ',')]
        filetypes: Vec<String>,
    },
    #[command(flatten)]
    Catalog(CatalogCommand),
}

/// Commands that run against an opened catalog.
#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Register new files from the document directory
    Index {
        /// Scan the document directory recursively
        #[arg(short, long)]
        recursive: bool,
    },
    /// List documents in insertion order
    List {
        /// At most this many documents, 0 for all
        #[arg(short, long, default_value_t = 0, allow_negative_numbers = true)]
        limit: i64,
        #[arg(long)]
        json: bool,
    },
    /// Attach tags to documents
    Tag {
        /// Document IDs, comma separated
        document_ids: String,
        /// Tags, comma separated
        tags: String,
    },
    /// Find documents by filename substring and/or tag
    Find {
        #[arg(short, long)]
        name: Option<String>,
        #[arg(short, long)]
        tag: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Open a document with the default application
    Open { document_id: i64 },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config_path = match args.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };

    let command = match args.command {
        Command::Init { documents, data, filetypes } => {
            return init(&config_path, documents, data, filetypes);
        }
        Command::Catalog(command) => command,
    };

    let settings = config::load(&config_path)?;
    info!("Document path: {:?}", settings.document_path);
    info!("Storage: {:?}", settings.storage_location());

    let store = Store::open(&settings.storage_location())?;
    let mut catalog = Catalog::open(store)?;
    run(command, &settings, &mut catalog)
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn init(path: &Path, documents: PathBuf, data: PathBuf, filetypes: Vec<String>) -> Result<()> {
    let supported_filetypes = if filetypes.is_empty() {
        config::default_filetypes()
    } else {
        split_list(&filetypes.join(","))
    };
    let settings = Settings {
        document_path: documents,
        data_path: data,
        supported_filetypes,
    };
    config::save(path, &settings)?;
    println!("Wrote configuration to {}", path.display());
    Ok(())
}

fn run(command: CatalogCommand, settings: &Settings, catalog: &mut Catalog) -> Result<()> {
    match command {
        CatalogCommand::Index { recursive } => {
            let report = catalog.index(&FsScanner, &settings.source(), recursive)?;
            for line in report::index_lines(&report) {
                println!("{line}");
            }
            if report.failed > 0 {
                bail!("{} documents could not be indexed", report.failed);
            }
        }
        CatalogCommand::List { limit, json } => {
            let documents = match catalog.list(limit) {
                Err(CatalogError::Usage(msg)) => usage_error(&msg),
                other => other?,
            };
            print_documents(&documents, json)?;
        }
        CatalogCommand::Tag { document_ids, tags } => {
            let ids = parse_ids(&document_ids).unwrap_or_else(|msg| usage_error(&msg));
            let values = split_list(&tags);
            if values.is_empty() {
                usage_error("no tags given");
            }

            let outcomes = catalog.tag(&ids, &values);
            for line in report::tag_lines(&outcomes) {
                println!("{line}");
            }

            let failed = outcomes
                .iter()
                .filter(|o| matches!(&o.result, Err(e) if !e.is_not_found()))
                .count();
            if failed > 0 {
                bail!("{failed} documents could not be tagged");
            }
        }
        CatalogCommand::Find { name, tag, json } => {
            let documents = catalog.find(name.as_deref(), tag.as_deref())?;
            print_documents(&documents, json)?;
        }
        CatalogCommand::Open { document_id } => match catalog.get(document_id) {
            Ok(document) => opener::open_document(&settings.document_path, &document)?,
            Err(e) if e.is_not_found() => println!("No document with ID {document_id}"),
            Err(e) => {
                error!("Failed to look up document {}: {}", document_id, e);
                return Err(e.into());
            }
        },
    }
    Ok(())
}

fn print_documents(documents: &[database::repo::Document], json: bool) -> Result<()> {
    if json {
        println!("{}", table::render_json(documents)?);
    } else {
        print!("{}", table::render(documents));
    }
    Ok(())
}

fn usage_error(msg: &str) -> ! {
    Args::command().error(ErrorKind::InvalidValue, msg).exit()
}

/// Splits a comma separated list, trimming entries and dropping empty ones.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_ids(raw: &str) -> std::result::Result<Vec<i64>, String> {
    let ids = split_list(raw)
        .iter()
        .map(|s| s.parse::<i64>().map_err(|_| format!("invalid document ID '{s}'")))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if ids.is_empty() {
        return Err("no document IDs given".to_string());
    }
    Ok(ids)
}
