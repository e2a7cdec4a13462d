use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use log::info;

use renova::config::{Config, Credentials};
use renova::diagnostics::FileDiagnostics;
use renova::engine::RenewalEngine;
use renova::extraction::{FieldExtract, FieldExtractor};
use renova::portal::{DriverFactory, WebDriverFactory};
use renova::portal::session;
use renova::storage::{CertificateStore, JsonFileStore};
use renova::utils::RenewalError;

#[derive(Parser)]
#[command(name = "renova")]
#[command(about = "Renews vehicle-inspection certificates on the operator portal")]
struct Cli {
    /// JSON configuration file; missing keys keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the full renewal lifecycle for one certificate record.
    Run {
        /// Id of the certificate record to process.
        certificate_id: u64,
        /// JSON store holding the certificate records.
        #[arg(long, default_value = "certificates.json")]
        store: PathBuf,
    },
    /// Extracts the certificate number and expiry date from a scanned
    /// document, without touching the portal.
    Extract {
        /// Scanned certificate (PDF or image).
        document: PathBuf,
        /// Bound on the extraction, in seconds.
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Performs only the portal login and reports the result.
    LoginCheck,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), RenewalError> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    match cli.command {
        Command::Run {
            certificate_id,
            store,
        } => run_renewal(config, certificate_id, store).await,
        Command::Extract { document, timeout } => extract_only(config, document, timeout).await,
        Command::LoginCheck => login_check(config).await,
    }
}

async fn run_renewal(
    config: Config,
    certificate_id: u64,
    store_path: PathBuf,
) -> Result<(), RenewalError> {
    let store: Arc<dyn CertificateStore> = Arc::new(JsonFileStore::new(&store_path));
    let extractor = Arc::new(FieldExtractor::with_defaults(config.extraction.clone())?);
    let factory = Arc::new(WebDriverFactory::new(
        &config.portal.webdriver_url,
        config.portal.headless,
    ));
    let diagnostics = Arc::new(FileDiagnostics::new(config.engine.artifacts_dir.clone()));

    let engine = RenewalEngine::new(config, Arc::clone(&store), extractor, factory, diagnostics);
    let result = engine.run(certificate_id).await;

    let record = store.load(certificate_id)?;
    println!(
        "certificate {}: status {} after attempt {}",
        record.id, record.status, record.attempt_count
    );
    if let Some(message) = &record.error_message {
        println!("  last error: {}", message);
    }
    result
}

async fn extract_only(config: Config, document: PathBuf, timeout: u64) -> Result<(), RenewalError> {
    let extractor = Arc::new(FieldExtractor::with_defaults(config.extraction)?);
    info!("extracting fields from {}", document.display());

    let task = tokio::task::spawn_blocking(move || extractor.extract(&document));
    let fields = tokio::time::timeout(Duration::from_secs(timeout), task)
        .await
        .map_err(|_| RenewalError::Timeout(timeout))?
        .map_err(|e| RenewalError::Extraction(format!("extraction task panicked: {}", e)))??;

    println!("document number: {}", fields.document_number);
    println!("expiry date:     {}", fields.expiry_date);
    Ok(())
}

async fn login_check(config: Config) -> Result<(), RenewalError> {
    let credentials = Credentials::from_env()?;
    let factory = WebDriverFactory::new(&config.portal.webdriver_url, config.portal.headless);
    let diagnostics = FileDiagnostics::new(config.engine.artifacts_dir.clone());

    let mut driver = factory
        .create()
        .await
        .map_err(|e| RenewalError::Navigation(format!("failed to open a browser session: {}", e)))?;
    let result = session::login(
        driver.as_mut(),
        &config.portal,
        &config.timing,
        &credentials,
        &diagnostics,
    )
    .await;
    if let Err(e) = driver.close().await {
        eprintln!("warning: failed to close the browser session: {}", e);
    }

    result?;
    println!("login succeeded");
    Ok(())
}
