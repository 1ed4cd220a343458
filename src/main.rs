use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use i18n_harvest::config::DEFAULT_CONFIG_FILE;
use i18n_harvest::mt::{GoogleTranslateProvider, MachineTranslator, MockMode, MockTranslator};
use i18n_harvest::{Config, LocaleStore, Pipeline};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Arguments {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Debug, Clone, Args)]
struct CommonArgs {
    /// Config file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Maximum translation requests in flight (overrides config file)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Suffix strings with the locale instead of calling Google Translate
    #[arg(short, long, global = true)]
    mock: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Extract keys from the fragments and rebuild every staging tree
    Extract,
    /// Translate the stored staging trees and publish the final trees
    Translate,
    /// Extract, rebuild and translate in one go
    Run,
    /// Give every target staging tree the key set of the base locale
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Arguments::parse();

    let level = if args.common.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    let mut config = Config::load(&args.common.config)
        .with_context(|| format!("Failed to load {}", args.common.config.display()))?;
    if let Some(concurrency) = args.common.concurrency {
        config.concurrency = concurrency;
    }

    let store = config.locale_store();
    let mirrors = config.mirror_stores();
    let pipeline = Pipeline::new(&config, &store)
        .with_mirrors(mirrors.iter().map(|m| m as &dyn LocaleStore).collect());

    let report = match args.command {
        Command::Extract => {
            let source = pipeline.fragment_source()?;
            let (extracted, mut report) = pipeline.extract(&source);
            let (_, reconciled) = pipeline.reconcile(&extracted)?;
            report.merge(&reconciled);
            report
        }
        Command::Translate => {
            let translator = translator(args.common.mock)?;
            // Fragments are only read to learn which keys hold markup.
            let (extracted, _) = pipeline.extract(&pipeline.fragment_source()?);
            let mut trees = pipeline.load_staging()?;
            trees.markup_keys = extracted.markup_keys;
            pipeline.translate(translator.as_ref(), trees).await?
        }
        Command::Run => {
            let translator = translator(args.common.mock)?;
            let source = pipeline.fragment_source()?;
            pipeline.run(&source, translator.as_ref()).await?
        }
        Command::Sync => pipeline.sync()?,
    };

    println!("{}", report);
    Ok(())
}

fn translator(mock: bool) -> Result<Box<dyn MachineTranslator>> {
    if mock {
        return Ok(Box::new(MockTranslator::new(MockMode::Suffix)));
    }
    let provider = GoogleTranslateProvider::from_env()
        .context("Set GOOGLE_TRANSLATE_API_KEY or pass --mock")?;
    info!(provider = provider.provider_name(), "Using machine translator");
    Ok(Box::new(provider))
}
