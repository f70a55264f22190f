//! Ferry - selective source deploy/retrieve
//!
//! Usage:
//!   ferry deploy cmp -p force-app/main/default/classes/MyClass.cls
//!   ferry deploy dir -d force-app/main/default/permissionsets -c
//!   ferry deploy module -p config/modules.json --onebyone
//!   ferry retrieve -t PermissionSet -n Admin,Sales -d out/permissionsets

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ferry_core::context::AppContext;
use ferry_core::pipeline::{
    DeployMode, DeployOutcome, DeploymentRequest, RetrievalRequest, RetrieveOutcome,
};

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Deploy and retrieve selected metadata source", long_about = None)]
struct Cli {
    /// Username or alias of the target org (defaults to the tool's default org)
    #[arg(short = 'u', long, global = true)]
    targetusername: Option<String>,

    /// API version to use instead of asking the org
    #[arg(long, global = true)]
    apiversion: Option<String>,

    /// Output format
    #[arg(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    /// Log pipeline stages and tool command lines
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Deploy a component, a directory, or a set of modules
    Deploy(DeployArgs),

    /// Retrieve components of one type into a directory
    Retrieve(RetrieveArgs),
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[derive(Args)]
struct DeployArgs {
    #[command(subcommand)]
    command: DeploySubcommand,
}

#[derive(Subcommand)]
enum DeploySubcommand {
    /// Deploy a single component (file or folder)
    Cmp {
        /// Path of the component, inside the project
        #[arg(short, long)]
        path: PathBuf,
        #[command(flatten)]
        package: PackageArgs,
    },

    /// Deploy the contents of a directory as one module
    Dir {
        /// Directory whose contents are deployed
        #[arg(short, long)]
        directorypath: PathBuf,
        #[command(flatten)]
        package: PackageArgs,
    },

    /// Deploy modules listed in a dependency file
    ///
    /// Modules are merged into one package in file order, later modules
    /// overriding earlier ones, unless --onebyone is given.
    Module {
        /// JSON file with an ordered `packageDirectories` list
        #[arg(short = 'p', long)]
        dependenciesfile: PathBuf,
        /// Deploy each module separately, in file order
        #[arg(short, long)]
        onebyone: bool,
        #[command(flatten)]
        package: PackageArgs,
    },
}

#[derive(Args)]
struct PackageArgs {
    /// Validate only; nothing is saved in the org
    #[arg(short = 'c', long)]
    validate: bool,
    /// Directory that receives a copy of the converted package (defaults to the project root)
    #[arg(short = 'l', long)]
    packagelocation: Option<PathBuf>,
}

#[derive(Args)]
struct RetrieveArgs {
    /// Component type, e.g. PermissionSet
    #[arg(short = 't', long = "type")]
    type_name: String,
    /// Comma-separated component names (all components when omitted)
    #[arg(short, long, value_delimiter = ',')]
    names: Vec<String>,
    /// Directory that receives the retrieved files
    #[arg(short = 'd', long)]
    targetdir: PathBuf,
    /// Keep the component-type folder in the target directory
    #[arg(short, long)]
    includedir: bool,
    /// Keep metadata-API file names
    #[arg(short, long)]
    mdapiformat: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cwd = std::env::current_dir()?;
    let mut ctx = AppContext::discover(cwd)?;
    ctx.apply_overrides(cli.targetusername, cli.apiversion);

    match cli.command {
        Commands::Deploy(args) => run_deploy(&ctx, args, cli.format).await,
        Commands::Retrieve(args) => run_retrieve(&ctx, args, cli.format).await,
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "ferry=debug,info" } else { "ferry=info,warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run_deploy(ctx: &AppContext, args: DeployArgs, format: OutputFormat) -> Result<()> {
    let (mode, package) = match args.command {
        DeploySubcommand::Cmp { path, package } => {
            (DeployMode::Component(ctx.project_relative(&path)?), package)
        }
        DeploySubcommand::Dir {
            directorypath,
            package,
        } => (
            DeployMode::Directory(ctx.project_relative(&directorypath)?),
            package,
        ),
        DeploySubcommand::Module {
            dependenciesfile,
            onebyone,
            package,
        } => (
            DeployMode::Modules {
                modules: ctx.load_modules(&dependenciesfile)?,
                sequential: onebyone,
            },
            package,
        ),
    };

    let request = DeploymentRequest {
        mode,
        validate_only: package.validate,
        package_location: package.packagelocation.map(|path| ctx.resolve(&path)),
    };
    let outcome = ctx.runner().deploy(&request).await?;
    print_deploy_result(&outcome, format)
}

async fn run_retrieve(ctx: &AppContext, args: RetrieveArgs, format: OutputFormat) -> Result<()> {
    let request = RetrievalRequest {
        type_name: args.type_name,
        names: args
            .names
            .into_iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect(),
        target_dir: ctx.resolve(&args.targetdir),
        include_dir: args.includedir,
        mdapi_format: args.mdapiformat,
    };
    let outcome = ctx.runner().retrieve(&request).await?;
    print_retrieve_result(&request, &outcome, format)
}

fn print_deploy_result(outcome: &DeployOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let verb = if outcome.validate_only { "Validated" } else { "Deployed" };
            match &outcome.package {
                Some(package) => {
                    println!("✓ {} package", verb);
                    println!("  Package copied to {}", package.destination_path.display());
                }
                None => {
                    println!("✓ {} {} module(s)", verb, outcome.deployed.len());
                    for path in &outcome.deployed {
                        println!("  {}", path.display());
                    }
                }
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "status": "ok",
                "operation": "deploy",
                "result": outcome,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_retrieve_result(
    request: &RetrievalRequest,
    outcome: &RetrieveOutcome,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => {
            println!(
                "✓ Retrieved {} file(s) of type '{}' into {}",
                outcome.files.len(),
                request.type_name,
                outcome.target_dir.display()
            );
            for file in &outcome.files {
                let shown = file.strip_prefix(&outcome.target_dir).unwrap_or(file);
                println!("  {}", shown.display());
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "status": "ok",
                "operation": "retrieve",
                "type": request.type_name,
                "result": outcome,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}
