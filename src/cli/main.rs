//! CLI binary entry point for interop-cli

#[cfg(feature = "cli")]
use anyhow::Context;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand, ValueEnum};
#[cfg(feature = "cli")]
use notebook_interop_sdk::cli::commands::convert::{ConvertArgs, handle_convert};
#[cfg(feature = "cli")]
use notebook_interop_sdk::cli::commands::modules::{ModulesArgs, handle_modules};
#[cfg(feature = "cli")]
use notebook_interop_sdk::models::{ModuleType, OutputFormat};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::EnvFilter;

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "interop-cli")]
#[command(about = "Convert notebooks between import/export formats")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// List the available import and export modules
    Modules {
        /// Only list importers or exporters
        #[arg(long = "type", value_enum)]
        module_type: Option<ModuleTypeArg>,
        /// Directory containing .interop.toml
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Import a file or directory and export it in another format
    Convert {
        /// Source file or directory
        input: PathBuf,
        /// Destination file or directory
        output: PathBuf,
        /// Import format (default: from .interop.toml, else "auto")
        #[arg(long)]
        from: Option<String>,
        /// Export format (default: from .interop.toml, else "jex")
        #[arg(long)]
        to: Option<String>,
        /// Body format produced by the importer
        #[arg(long, value_enum)]
        output_format: Option<OutputFormatArg>,
        /// Working directory for attachment payloads (default: a temporary directory)
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Directory containing .interop.toml
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum ModuleTypeArg {
    Importer,
    Exporter,
}

#[cfg(feature = "cli")]
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormatArg {
    Md,
    Html,
}

#[cfg(feature = "cli")]
fn convert_module_type(arg: ModuleTypeArg) -> ModuleType {
    match arg {
        ModuleTypeArg::Importer => ModuleType::Importer,
        ModuleTypeArg::Exporter => ModuleType::Exporter,
    }
}

#[cfg(feature = "cli")]
fn convert_output_format(arg: OutputFormatArg) -> OutputFormat {
    match arg {
        OutputFormatArg::Md => OutputFormat::Markdown,
        OutputFormatArg::Html => OutputFormat::Html,
    }
}

#[cfg(feature = "cli")]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Modules {
            module_type,
            config,
            json,
        } => {
            let args = ModulesArgs {
                module_type: module_type.map(convert_module_type),
                config_dir: config,
                json,
            };
            handle_modules(&args).context("Failed to list modules")?;
        }
        Commands::Convert {
            input,
            output,
            from,
            to,
            output_format,
            workdir,
            config,
        } => {
            let args = ConvertArgs {
                input,
                output,
                from,
                to,
                output_format: output_format.map(convert_output_format),
                workdir,
                config_dir: config,
            };
            let result = handle_convert(&args).await.with_context(|| {
                format!(
                    "Failed to convert {} to {}",
                    args.input.display(),
                    args.output.display()
                )
            })?;
            for warning in &result.warnings {
                eprintln!("Warning: {}", warning);
            }
        }
    }
    Ok(())
}

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() {
    let log_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(log_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
