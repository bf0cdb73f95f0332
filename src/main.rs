use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use scraper::{Html, Selector};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use selector_studio::config::{get_config_path, AppConfig};
use selector_studio::dsl::{BaseParameters, ConfigAssembler, ConfigParser};
use selector_studio::logging::{init_logging, LogContext, RequestIdGenerator};
use selector_studio::selector;
use selector_studio::service::HttpConfigService;
use selector_studio::store::{Selection, SelectionListView, SelectionStore};
use selector_studio::validation::{DocumentValidator, ValidationClient, ValidationReport};

#[derive(Parser)]
#[command(name = "selector-studio")]
#[command(about = "Build and check CSS selectors for scraper configurations")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long, help = "Enable verbose logging")]
    verbose: bool,

    #[arg(short, long, help = "Configuration file path")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the synthesized selector for every element matching a query
    Selector {
        #[arg(long, help = "HTML file to load")]
        html: PathBuf,

        #[arg(long, help = "CSS query locating the elements to describe")]
        query: String,

        #[arg(long, help = "Container selector; output is relative to it")]
        within: Option<String>,
    },

    /// Assemble a scraper configuration from saved selections
    Assemble {
        #[arg(long, help = "JSON file mapping selection names to selections")]
        selections: PathBuf,

        #[arg(long, help = "Target page URL")]
        url: String,

        #[arg(long, help = "HTML of the page, used to decide on JS rendering")]
        html: Option<PathBuf>,

        #[arg(short, long, help = "Output file path (defaults to a name derived from the URL)")]
        output: Option<PathBuf>,
    },

    /// Validate a configuration's selectors against a local HTML file
    Validate {
        #[arg(long, help = "HTML file to validate against")]
        html: PathBuf,

        #[arg(long, help = "Scraper configuration (YAML)")]
        config: PathBuf,
    },

    /// Validate a configuration's selectors through the configuration service
    RemoteValidate {
        #[arg(long, help = "Scraper configuration (YAML)")]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from_file(path).await?,
        None => AppConfig::load().await?,
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }

    init_logging(&config.logging)?;

    let context = LogContext::new("main", "startup")
        .with_request_id(RequestIdGenerator::generate())
        .with_string_field("version", env!("CARGO_PKG_VERSION"));
    selector_studio::log_info!(context, "Selector Studio starting up");
    info!(
        "Using configuration from {}",
        cli.config.clone().unwrap_or_else(get_config_path).display()
    );

    match cli.command {
        Commands::Selector { html, query, within } => describe_elements(&html, &query, within.as_deref()).await,
        Commands::Assemble { selections, url, html, output } => {
            assemble(&config, &selections, &url, html.as_deref(), output).await
        }
        Commands::Validate { html, config: config_path } => validate_local(&html, &config_path).await,
        Commands::RemoteValidate { config: config_path } => validate_remote(&config, &config_path).await,
    }
}

async fn describe_elements(html_path: &Path, query: &str, within: Option<&str>) -> Result<()> {
    let content = tokio::fs::read_to_string(html_path)
        .await
        .with_context(|| format!("reading {}", html_path.display()))?;
    let document = Html::parse_document(&content);

    let target = Selector::parse(query).map_err(|e| anyhow!("invalid query '{}': {}", query, e))?;
    let scope = within
        .map(|css| Selector::parse(css).map_err(|e| anyhow!("invalid container '{}': {}", css, e)))
        .transpose()?;

    let mut found = 0;
    for element in document.select(&target) {
        found += 1;
        match &scope {
            Some(scope) => {
                let scoped = selector::synthesize_within(element, scope);
                let marker = if scoped.relative { "relative" } else { "absolute" };
                println!("{}\t({})", scoped.selector, marker);
            }
            None => println!("{}", selector::synthesize(element)),
        }
    }

    if found == 0 {
        return Err(anyhow!("no element matches '{}'", query));
    }
    Ok(())
}

async fn read_selections(path: &Path) -> Result<SelectionStore> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let selections: BTreeMap<String, Selection> = serde_json::from_str(&content)?;

    let mut store = SelectionStore::new();
    for (name, selection) in selections {
        store.add(name, selection)?;
    }
    Ok(store)
}

async fn assemble(
    config: &AppConfig,
    selections: &Path,
    url: &str,
    html: Option<&Path>,
    output: Option<PathBuf>,
) -> Result<()> {
    let store = read_selections(selections).await?;
    if store.is_empty() {
        return Err(anyhow!("{} contains no selections", selections.display()));
    }
    eprintln!("{}", SelectionListView::render(&store).to_text());

    let mut base = BaseParameters::with_defaults(url, &config.output);
    if let Some(html) = html {
        let page = tokio::fs::read_to_string(html).await?;
        base.render_js = BaseParameters::infer_render_js(&page);
    }

    let yaml = ConfigAssembler::assemble(&store, base).to_yaml()?;
    let output = output.unwrap_or_else(|| PathBuf::from(ConfigAssembler::suggested_filename(url)));
    tokio::fs::write(&output, yaml).await?;

    info!("Wrote {} selections to {}", store.len(), output.display());
    println!("{}", output.display());
    Ok(())
}

fn print_report(report: &ValidationReport) -> Result<()> {
    println!("{}", report.to_text());
    if report.all_passed() {
        Ok(())
    } else {
        Err(anyhow!("some selectors did not match"))
    }
}

async fn validate_local(html: &Path, config_path: &Path) -> Result<()> {
    let page = tokio::fs::read_to_string(html).await?;
    let yaml = tokio::fs::read_to_string(config_path).await?;
    let config = ConfigParser::parse_yaml(&yaml)?;

    let results = DocumentValidator::new(&page).validate(&config.extract);
    print_report(&ValidationReport::from_results(results))
}

async fn validate_remote(app_config: &AppConfig, config_path: &Path) -> Result<()> {
    let yaml = tokio::fs::read_to_string(config_path).await?;
    let config = ConfigParser::parse_yaml(&yaml)?;
    let store = ConfigParser::to_store(&config)?;

    let service = HttpConfigService::new(&app_config.service, &app_config.preview)?;
    info!("Validating {} selectors via {}", store.len(), service.base_url());

    let client = ValidationClient::new(Arc::new(service));
    let report = client.validate(config.url(), &store, config.base.clone()).await?;
    print_report(&report)
}
