use clap::{Parser, Subcommand, ValueEnum};
use grove_config::{ModulePath, ModuleTree, ResourceAddress};
use grove_graph::{GraphBuilder, ImportGraphBuilder, ImportTarget};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_LOG_FILTER: &str = "grove=info";

#[derive(Parser, Debug)]
#[command(name = "grove")]
#[command(about = "Build and inspect infrastructure import graphs")]
struct Cli {
    /// Log filter, e.g. `grove=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    ImportGraph(ImportGraphArgs),
    ValidateConfig(ValidateConfigArgs),
}

#[derive(clap::Args, Debug)]
struct ImportGraphArgs {
    #[arg(long, env = "GROVE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    #[arg(long = "provider", env = "GROVE_PROVIDERS", value_delimiter = ',')]
    providers: Vec<String>,
    /// `ADDR=ID` or `ADDR=ID@PROVIDER`.
    #[arg(long = "target", value_parser = parse_target)]
    targets: Vec<ImportTarget>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(clap::Args, Debug)]
struct ValidateConfigArgs {
    #[arg(long, env = "GROVE_CONFIG_DIR")]
    config_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Dot,
    Json,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    let result = match cli.command {
        Commands::ImportGraph(args) => import_graph_command(args),
        Commands::ValidateConfig(args) => validate_config_command(args),
    };

    match result {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(log_level: Option<&str>) {
    let filter = match log_level {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_target(raw: &str) -> Result<ImportTarget, String> {
    let Some((addr, rest)) = raw.split_once('=') else {
        return Err(format!("'{raw}' must look like ADDR=ID or ADDR=ID@PROVIDER"));
    };
    let (id, provider) = match rest.rsplit_once('@') {
        Some((id, provider)) if !provider.is_empty() => (id, Some(provider)),
        _ => (rest, None),
    };
    if id.is_empty() {
        return Err(format!("'{raw}' has an empty import id"));
    }

    let addr: ResourceAddress = addr.parse().map_err(|error| format!("{error}"))?;
    let target = ImportTarget::new(addr, id);
    Ok(match provider {
        Some(provider) => target.with_provider(provider),
        None => target,
    })
}

fn load_module(dir: &Path) -> Result<ModuleTree, String> {
    debug!(dir = %dir.display(), "loading configuration");
    ModuleTree::load(dir).map_err(|error| error.to_string())
}

fn import_graph_command(args: ImportGraphArgs) -> Result<ExitCode, String> {
    let mut builder = ImportGraphBuilder::new(args.targets, args.providers);
    if let Some(dir) = args.config_dir.as_deref() {
        builder = builder.with_module(Arc::new(load_module(dir)?));
    }

    let graph = builder
        .build(&ModulePath::root())
        .map_err(|error| error.to_string())?;
    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        hash = %graph.content_hash(),
        "import graph built"
    );

    match args.format {
        OutputFormat::Text => print!("{graph}"),
        OutputFormat::Dot => println!("{}", graph.to_dot()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&graph).map_err(|e| e.to_string())?;
            println!("{json}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn validate_config_command(args: ValidateConfigArgs) -> Result<ExitCode, String> {
    let tree = load_module(&args.config_dir)?;
    tree.validate().map_err(|error| error.to_string())?;

    let modules = tree.descendants();
    let resources: usize = modules.iter().map(|module| module.config.resources.len()).sum();
    let providers: usize = modules.iter().map(|module| module.config.providers.len()).sum();
    println!("config_dir: {}", args.config_dir.display());
    println!("modules: {}", modules.len());
    println!("resources: {resources}");
    println!("providers: {providers}");
    Ok(ExitCode::SUCCESS)
}
