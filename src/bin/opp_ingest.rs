use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use opp_ingest::app::App;
use opp_ingest::config::{ConfigLoader, ResolvedConfig, StoreConfig};
use opp_ingest::datapackage::DataPackage;
use opp_ingest::elastic::ElasticStore;
use opp_ingest::error::OppError;
use opp_ingest::ontology::OntologyCatalog;
use opp_ingest::output::JsonOutput;
use opp_ingest::store::{DocumentStore, FileStore};

#[derive(Parser)]
#[command(name = "opp-ingest")]
#[command(about = "Ingest ocean proteomics data packages into a document search index")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Initialize the document store (drops an existing index)")]
    Init(ConfigArgs),
    #[command(about = "Run the configured ingest stages over a data package")]
    Ingest(ConfigArgs),
}

#[derive(Args)]
struct ConfigArgs {
    #[arg(long)]
    config: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<OppError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &OppError) -> u8 {
    match error {
        OppError::Configuration(_)
        | OppError::MissingConfig
        | OppError::ConfigRead(_)
        | OppError::ConfigParse(_)
        | OppError::UnknownOntologyVersion(_)
        | OppError::DataPackage(_) => 2,
        OppError::Store(_)
        | OppError::StoreStatus { .. }
        | OppError::TableRead(_)
        | OppError::FastaRead(_)
        | OppError::Filesystem(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
            match &config.store {
                StoreConfig::File { root } => {
                    init_store(file_store(root).into_diagnostic()?).into_diagnostic()
                }
                StoreConfig::Elastic { url, index } => {
                    init_store(elastic_store(url, index.as_deref()).into_diagnostic()?)
                        .into_diagnostic()
                }
            }
        }
        Commands::Ingest(args) => {
            let config = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
            match &config.store {
                StoreConfig::File { root } => {
                    run_ingest(file_store(root).into_diagnostic()?, &config)
                }
                StoreConfig::Elastic { url, index } => {
                    run_ingest(elastic_store(url, index.as_deref()).into_diagnostic()?, &config)
                }
            }
        }
    }
}

fn file_store(root: &Option<String>) -> Result<FileStore, OppError> {
    match root {
        Some(root) => Ok(FileStore::open(Utf8PathBuf::from(root.as_str()))),
        None => FileStore::new(),
    }
}

fn elastic_store(url: &str, index: Option<&str>) -> Result<ElasticStore, OppError> {
    ElasticStore::new(url, index.unwrap_or("protein-portal"))
}

fn init_store<S: DocumentStore>(store: S) -> Result<(), OppError> {
    store.initialize()
}

fn run_ingest<S: DocumentStore>(store: S, config: &ResolvedConfig) -> miette::Result<()> {
    let catalog = match &config.ontology {
        Some(path) => OntologyCatalog::from_file(path).into_diagnostic()?,
        None => OntologyCatalog::builtin(),
    };
    let package = DataPackage::load(&config.datapackage).into_diagnostic()?;
    let app = App::new(store, catalog);
    let report = app.ingest(&package, &config.options).into_diagnostic()?;
    JsonOutput::print_report(&report).into_diagnostic()?;
    Ok(())
}
