use anyhow::Context;
use base64::Engine as _;
use clap::{Parser, Subcommand};
use fhir::{FileRecordSource, HttpRecordSource, RecordSource};
use pdoc_core::{
    unit_policy_from_env_value, ContainerNames, CoreConfig, DocumentKind, DocumentService,
    PatientId, TextCatalog,
};
use pdoc_files::FsBlobStore;
use pdoc_render::{register_chart_font, OutputFormat, PlottersChartRenderer};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pdoc")]
#[command(about = "Generate and fetch patient documents")]
struct Cli {
    /// Directory of exported FHIR records (`<dir>/<id>/patient.json`)
    #[arg(long, conflicts_with = "fhir_url", required_unless_present = "fhir_url")]
    records_dir: Option<PathBuf>,
    /// Base URL of a FHIR REST server
    #[arg(long)]
    fhir_url: Option<String>,
    /// Root directory of the document store
    #[arg(long)]
    storage_root: PathBuf,
    /// YAML text catalog replacing the built-in wording
    #[arg(long)]
    catalog: Option<PathBuf>,
    /// Output format: pdf or markdown
    #[arg(long, default_value = "pdf")]
    format: String,
    /// Stage rendered documents in this directory before upload
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
    /// Mixed-unit handling: last-write-wins or reject
    #[arg(long)]
    unit_policy: Option<String>,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,
    /// TrueType/OpenType font replacing the bundled chart font
    #[arg(long)]
    chart_font: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Feedback request letter
    Feedback {
        /// Patient ID
        id: String,
        /// Print the letter's data without generating it
        #[arg(long)]
        data_only: bool,
    },
    /// Health data report
    Health {
        /// Patient ID
        id: String,
        /// Print the vital-sign series without generating the report
        #[arg(long)]
        data_only: bool,
    },
    /// Personal details form
    Details {
        /// Patient ID
        id: String,
    },
    /// Download a stored document
    Fetch {
        /// Document kind: feedback, health-data or details
        kind: String,
        /// Patient ID
        id: String,
        /// Write the document here instead of printing it base64-encoded
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("pdoc_core=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let service = build_service(&cli)?;
    run(&service, cli.command, &mut std::io::stdout().lock())
}

/// Wire the document service from command-line flags.
fn build_service(cli: &Cli) -> anyhow::Result<DocumentService> {
    let timeout = Duration::from_secs(cli.timeout);

    let catalog = match &cli.catalog {
        Some(path) => TextCatalog::load(path)?,
        None => TextCatalog::default(),
    };
    let cfg = CoreConfig::new(
        ContainerNames::default(),
        cli.scratch_dir.clone(),
        timeout,
        unit_policy_from_env_value(cli.unit_policy.clone())?,
        catalog,
    )?;

    let records: Arc<dyn RecordSource> = match (&cli.fhir_url, &cli.records_dir) {
        (Some(url), _) => Arc::new(HttpRecordSource::new(url.as_str(), timeout)?),
        (None, Some(dir)) => Arc::new(FileRecordSource::new(dir)),
        (None, None) => anyhow::bail!("one of --records-dir or --fhir-url is required"),
    };

    if let Some(path) = &cli.chart_font {
        let font = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        register_chart_font(font)?;
    }

    let format: OutputFormat = cli.format.parse()?;
    let store = FsBlobStore::create(&cli.storage_root)?;

    Ok(DocumentService::new(
        Arc::new(cfg),
        records,
        Arc::new(PlottersChartRenderer::default()),
        format.renderer(),
        Arc::new(store),
    ))
}

fn run(service: &DocumentService, command: Commands, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Commands::Feedback { id, data_only } => {
            let id = PatientId::parse(id)?;
            if data_only {
                print_json(out, &service.feedback_data(&id)?)
            } else {
                print_json(out, &service.generate_feedback(&id)?)
            }
        }
        Commands::Health { id, data_only } => {
            let id = PatientId::parse(id)?;
            if data_only {
                print_json(out, &service.health_data(&id)?)
            } else {
                print_json(out, &service.generate_health_report(&id)?)
            }
        }
        Commands::Details { id } => {
            let id = PatientId::parse(id)?;
            print_json(out, &service.generate_patient_info(&id)?)
        }
        Commands::Fetch { kind, id, out: path } => {
            let kind: DocumentKind = kind.parse()?;
            let id = PatientId::parse(id)?;
            let artifact = service.fetch_artifact(kind, &id)?;
            match path {
                Some(path) => {
                    std::fs::write(&path, &artifact.bytes)
                        .with_context(|| format!("writing {}", path.display()))?;
                    writeln!(
                        out,
                        "Wrote {} ({} bytes) to {}",
                        artifact.name,
                        artifact.bytes.len(),
                        path.display()
                    )?;
                }
                None => {
                    let encoded = base64::engine::general_purpose::STANDARD.encode(&artifact.bytes);
                    writeln!(out, "{encoded}")?;
                }
            }
            Ok(())
        }
    }
}

fn print_json<T: serde::Serialize>(out: &mut impl Write, value: &T) -> anyhow::Result<()> {
    writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
    Ok(())
}
