//! CLI driver: harvest a collection, convert it to a table, or both.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use oaitab::{
    oai_to_json, oai_to_table, CollectionRegistry, ColumnNames, ConvertOptions, Harvester,
    HttpTransport,
};

/// Directory for harvested XML cache files.
const RAW_DIR: &str = "data/raw";
/// Directory for converted tables.
const CONVERTED_DIR: &str = "data/converted";

#[derive(Parser)]
#[command(
    name = "oaitab",
    version,
    about = "Harvest OAI-PMH bibliographic metadata and flatten it into tables"
)]
struct Cli {
    /// Collection registry JSON file (defaults to the built-in registry)
    #[arg(long, global = true)]
    collections: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest a collection into a local XML cache file
    Harvest {
        /// Collection key (see `oaitab collections`)
        key: String,
        /// Output file (defaults to data/raw/<key>.xml)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Convert a harvested file into a table
    Convert {
        /// Collection key or path to a harvested XML file
        source: String,
        /// Drop columns filled in no more than this fraction of rows (MARC only)
        #[arg(long, default_value_t = 0.1)]
        min_fill_ratio: f64,
        /// JSON dictionary of field-path -> column-name renames
        #[arg(long)]
        rename: Option<PathBuf>,
        /// Output format
        #[arg(long, value_enum, default_value = "csv")]
        format: OutputFormat,
        /// Output file (defaults to data/converted/<key>.<ext>)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Harvest a collection and convert it in one go
    Run {
        /// Collection key (see `oaitab collections`)
        key: String,
        /// Drop columns filled in no more than this fraction of rows (MARC only)
        #[arg(long, default_value_t = 0.1)]
        min_fill_ratio: f64,
    },
    /// List the known collections
    Collections,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Csv,
    Tsv,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Tsv => "tsv",
            OutputFormat::Json => "json",
        }
    }
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let registry = load_registry(cli.collections.as_deref())?;

    match cli.command {
        Command::Harvest { key, out } => {
            let path = out.unwrap_or_else(|| raw_path(&key));
            harvest(&registry, &key, &path)?;
        }
        Command::Convert {
            source,
            min_fill_ratio,
            rename,
            format,
            out,
        } => {
            let input = resolve_source(&registry, &source)?;
            let output = out.unwrap_or_else(|| converted_path(&source, format));
            convert(&input, &output, min_fill_ratio, rename.as_deref(), format)?;
        }
        Command::Run {
            key,
            min_fill_ratio,
        } => {
            let raw = raw_path(&key);
            harvest(&registry, &key, &raw)?;
            let output = converted_path(&key, OutputFormat::Csv);
            convert(&raw, &output, min_fill_ratio, None, OutputFormat::Csv)?;
        }
        Command::Collections => {
            for (key, descriptor) in registry.iter() {
                println!(
                    "{key:<20} {:<10} {}",
                    descriptor.original_format.to_string(),
                    descriptor.title
                );
            }
        }
    }

    Ok(())
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<CollectionRegistry> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("cannot open collection registry {}", path.display()))?;
            Ok(CollectionRegistry::from_json_reader(file)?)
        }
        None => Ok(CollectionRegistry::builtin()),
    }
}

fn raw_path(key: &str) -> PathBuf {
    Path::new(RAW_DIR).join(format!("{key}.xml"))
}

fn converted_path(source: &str, format: OutputFormat) -> PathBuf {
    let stem = Path::new(source)
        .file_stem()
        .map_or_else(|| source.to_string(), |s| s.to_string_lossy().into_owned());
    Path::new(CONVERTED_DIR).join(format!("{stem}.{}", format.extension()))
}

/// A convert source is either a harvested file path or a collection key
/// whose cache is expected at the default location.
fn resolve_source(registry: &CollectionRegistry, source: &str) -> anyhow::Result<PathBuf> {
    let as_path = PathBuf::from(source);
    if as_path.is_file() {
        return Ok(as_path);
    }
    if registry.get(source).is_some() {
        let cached = raw_path(source);
        if cached.is_file() {
            return Ok(cached);
        }
        bail!(
            "collection '{source}' has no harvested file at {} (run `oaitab harvest {source}` first)",
            cached.display()
        );
    }
    bail!("'{source}' is neither a file nor a known collection key");
}

fn harvest(registry: &CollectionRegistry, key: &str, out: &Path) -> anyhow::Result<()> {
    let collection = registry.require(key)?;
    println!("Harvesting {}", collection.title);

    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut destination = BufWriter::new(File::create(out)?);

    let transport = HttpTransport::for_collection_url(&collection.endpoint_url)?;
    let written = Harvester::new(transport)
        .harvest(&collection.endpoint_url, &mut destination)
        .with_context(|| format!("harvest of '{key}' did not complete"))?;

    println!("Harvested {written} records into {}", out.display());
    Ok(())
}

fn convert(
    input: &Path,
    output: &Path,
    min_fill_ratio: f64,
    rename: Option<&Path>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    println!("Converting {}", input.display());

    let rename = rename
        .map(|path| -> anyhow::Result<ColumnNames> {
            let file = File::open(path)
                .with_context(|| format!("cannot open rename dictionary {}", path.display()))?;
            Ok(ColumnNames::from_json_reader(file)?)
        })
        .transpose()?;

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let destination = BufWriter::new(File::create(output)?);

    match format {
        OutputFormat::Json => {
            let written = oai_to_json(input, destination)?;
            println!("Wrote {written} records to {}", output.display());
        }
        OutputFormat::Csv | OutputFormat::Tsv => {
            let options = ConvertOptions {
                min_fill_ratio,
                ..ConvertOptions::default()
            };
            let table = oai_to_table(input, &options, rename.as_ref())?;
            let delimiter = if format == OutputFormat::Tsv { b'\t' } else { b',' };
            table.write_delimited(destination, delimiter)?;
            println!(
                "Wrote {} rows x {} columns to {}",
                table.n_rows(),
                table.n_columns(),
                output.display()
            );
        }
    }

    Ok(())
}
