use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use kilt_loader::FsLoader;
use kilt_target::{render, BuildOptions, KustTarget, OutputFormat, Reorder};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "kiltctl", version, about = "Build kustomization directories into resource streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Yaml, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Order { None, Legacy }

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build a kustomization directory and print the result
    Build {
        /// Directory containing kustomization.yaml
        #[arg(default_value = ".")]
        dir: PathBuf,
        /// Output format
        #[arg(short = 'o', long = "output", value_enum, default_value_t = Output::Yaml)]
        output: Output,
        /// Skip the content-hash suffix on generated names
        #[arg(long = "disable-name-suffix-hash", action = ArgAction::SetTrue)]
        disable_name_suffix_hash: bool,
        /// Output order
        #[arg(long = "reorder", value_enum, default_value_t = Order::None)]
        reorder: Order,
    },
}

fn init_tracing() {
    let env = std::env::var("KILT_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { dir, output, disable_name_suffix_hash, reorder } => {
            info!(dir = %dir.display(), ?output, disable_name_suffix_hash, "build invoked");
            let ldr = FsLoader::new(&dir).with_context(|| format!("opening {}", dir.display()))?;
            let kt = KustTarget::new(Box::new(ldr))?;
            let mut opts = BuildOptions::default();
            if disable_name_suffix_hash {
                opts = opts.with_disable_name_suffix_hash(kt.kustomization(), true);
            }
            let m = kt.build(&opts).with_context(|| format!("building {}", dir.display()))?;
            let format = match output { Output::Yaml => OutputFormat::Yaml, Output::Json => OutputFormat::Json };
            let reorder = match reorder { Order::None => Reorder::None, Order::Legacy => Reorder::Legacy };
            let text = render(&m, format, reorder).map_err(anyhow::Error::msg).context("rendering output")?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            if format == OutputFormat::Json { writeln!(stdout)?; }
        }
    }
    Ok(())
}
