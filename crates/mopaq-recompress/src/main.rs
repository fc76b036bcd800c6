use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

use mopaq_recompress::{RecompressConfig, Recompressor};

#[derive(Parser)]
#[command(
    name = "mpq-recompress",
    about = "Recompress every file of an MPQ archive with zopfli",
    version,
    author,
    long_about = "Rewrites an MPQ archive with each file re-packed as zlib sectors found by zopfli. Hash and block tables keep their encryption, so existing readers can open the result. Files must be named by the archive's own listfile or by --listfile."
)]
struct Cli {
    /// Set the logging level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Path to a TOML configuration file; flags override its values
    #[arg(long, env = "MPQ_RECOMPRESS_CONFIG")]
    config: Option<PathBuf>,

    /// Worker threads, the main thread included
    #[arg(short, long)]
    threads: Option<usize>,

    /// zopfli iterations spent on every sector [default: 15]
    #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
    iterations: Option<u64>,

    /// Most block splits zopfli may try per sector [default: 15]
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    block_splitting_max: Option<u16>,

    /// Additional listfile naming the archive's files
    #[arg(short = 'L', long)]
    listfile: Option<PathBuf>,

    /// Sector size exponent of the output archive (0-15)
    #[arg(short, long = "shift-size", value_parser = clap::value_parser!(u16).range(0..=15))]
    shift: Option<u16>,

    /// Reuse and populate the result cache
    #[arg(short, long)]
    cache: bool,

    /// Result cache directory
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Source archive
    input: PathBuf,

    /// Output archive
    output: PathBuf,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Cli {
    /// Configuration file values with explicit flags applied on top
    fn into_config(self) -> anyhow::Result<(RecompressConfig, PathBuf, PathBuf)> {
        let mut config = match &self.config {
            Some(path) => RecompressConfig::load(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => RecompressConfig::default(),
        };

        if let Some(threads) = self.threads {
            config.threads = threads;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(max) = self.block_splitting_max {
            config.block_splitting_max = max;
        }
        if let Some(shift) = self.shift {
            config.shift = shift;
        }
        if self.cache {
            config.use_cache = true;
        }
        if let Some(dir) = self.cache_dir {
            config.cache_dir = dir;
        }
        if self.listfile.is_some() {
            config.listfile = self.listfile;
        }

        Ok((config, self.input, self.output))
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let (config, input, output) = cli.into_config()?;
    let recompressor = Recompressor::new(config).context("Invalid configuration")?;
    tracing::debug!("{:?}", recompressor.config());

    recompressor.run(&input, &output).with_context(|| {
        format!(
            "Failed to recompress {} into {}",
            input.display(),
            output.display()
        )
    })?;

    Ok(())
}
