use anyhow::Context;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::AppState;
use fhir::{FileRecordSource, HttpRecordSource, RecordSource};
use pdoc_core::{
    ContainerNames, CoreConfig, DocumentService, catalog_from_env_value,
    request_timeout_from_env_value, scratch_dir_from_env_value, unit_policy_from_env_value,
};
use pdoc_files::FsBlobStore;
use pdoc_render::{OutputFormat, PlottersChartRenderer, register_chart_font};

const DEFAULT_REST_ADDR: &str = "0.0.0.0:5010";
const DEFAULT_STORAGE_ROOT: &str = "/patient_documents";

/// Where clinical records are read from.
#[derive(Debug, PartialEq)]
enum RecordsSetting {
    Http(String),
    Directory(PathBuf),
}

/// Server settings resolved from the environment.
#[derive(Debug)]
struct ServerSettings {
    rest_addr: String,
    storage_root: PathBuf,
    records: RecordsSetting,
    format: OutputFormat,
    chart_font: Option<PathBuf>,
    core: CoreConfig,
}

impl ServerSettings {
    /// Resolve settings through `lookup`, which maps a variable name to its value.
    fn resolve(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let value = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let records = match (value("PDOC_FHIR_BASE_URL"), value("PDOC_RECORDS_DIR")) {
            (Some(url), _) => RecordsSetting::Http(url),
            (None, Some(dir)) => RecordsSetting::Directory(PathBuf::from(dir)),
            (None, None) => anyhow::bail!("set PDOC_FHIR_BASE_URL or PDOC_RECORDS_DIR"),
        };

        let format = match value("PDOC_OUTPUT_FORMAT") {
            Some(raw) => raw.parse()?,
            None => OutputFormat::default(),
        };

        let containers = ContainerNames::from_env_values(
            value("PDOC_FEEDBACK_CONTAINER"),
            value("PDOC_HEALTH_DATA_CONTAINER"),
            value("PDOC_PATIENT_INFO_CONTAINER"),
        )?;
        let core = CoreConfig::new(
            containers,
            scratch_dir_from_env_value(value("PDOC_SCRATCH_DIR")),
            request_timeout_from_env_value(value("PDOC_REQUEST_TIMEOUT_SECS"))?,
            unit_policy_from_env_value(value("PDOC_UNIT_POLICY"))?,
            catalog_from_env_value(value("PDOC_TEXT_CATALOG"))?,
        )?;

        Ok(Self {
            rest_addr: value("PDOC_REST_ADDR").unwrap_or_else(|| DEFAULT_REST_ADDR.into()),
            storage_root: PathBuf::from(
                value("PDOC_STORAGE_ROOT").unwrap_or_else(|| DEFAULT_STORAGE_ROOT.into()),
            ),
            records,
            format,
            chart_font: value("PDOC_CHART_FONT").map(PathBuf::from),
            core,
        })
    }

    /// Wire the document service. Must run outside the async runtime: the HTTP record source
    /// owns a blocking client.
    fn build_service(self) -> anyhow::Result<(String, DocumentService)> {
        let timeout: Duration = self.core.request_timeout();

        let records: Arc<dyn RecordSource> = match self.records {
            RecordsSetting::Http(url) => Arc::new(HttpRecordSource::new(url, timeout)?),
            RecordsSetting::Directory(dir) => Arc::new(FileRecordSource::new(dir)),
        };

        if let Some(path) = &self.chart_font {
            let font = std::fs::read(path).with_context(|| format!("reading chart font {}", path.display()))?;
            register_chart_font(font)?;
        }

        let store = FsBlobStore::create(&self.storage_root)?;
        let service = DocumentService::new(
            Arc::new(self.core),
            records,
            Arc::new(PlottersChartRenderer::default()),
            self.format.renderer(),
            Arc::new(store),
        );
        Ok((self.rest_addr, service))
    }
}

/// Main entry point for the patient documents server
///
/// Resolves configuration from the environment (and `.env`), wires the document service and
/// serves the REST API.
///
/// # Environment Variables
/// - `PDOC_REST_ADDR`: REST server address (default: "0.0.0.0:5010")
/// - `PDOC_STORAGE_ROOT`: Root directory of the document store (default: "/patient_documents")
/// - `PDOC_FHIR_BASE_URL` or `PDOC_RECORDS_DIR`: Clinical record source
/// - `PDOC_OUTPUT_FORMAT`: `pdf` (default) or `markdown`
/// - `PDOC_CHART_FONT`: Font file replacing the bundled chart font
/// - `PDOC_FEEDBACK_CONTAINER`, `PDOC_HEALTH_DATA_CONTAINER`, `PDOC_PATIENT_INFO_CONTAINER`
/// - `PDOC_SCRATCH_DIR`, `PDOC_REQUEST_TIMEOUT_SECS`, `PDOC_UNIT_POLICY`, `PDOC_TEXT_CATALOG`
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or serving fails
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pdoc=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = ServerSettings::resolve(|name| std::env::var(name).ok())?;
    let (rest_addr, service) = settings.build_service()?;
    let state = AppState::new(service);
    let app = api_rest::router(state.clone());

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        tracing::info!("++ Starting patient documents REST on {}", rest_addr);
        let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
        axum::serve(listener, app).await?;
        Ok::<(), anyhow::Error>(())
    })?;

    // The service owns the blocking HTTP client; release it off the runtime.
    drop(runtime);
    drop(state);
    Ok(())
}
