//! Sign Recognizer - replays a control session against a reference directory.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;

use sign_recognizer::control::Session;
use sign_recognizer::engine::{Engine, EngineConfig, TriggerMode};
use sign_recognizer::matching::Embedding;
use sign_recognizer::store::FsReferenceStore;

#[derive(Parser, Debug)]
#[command(name = "sign-recognizer", about = "DTW hand-sign recognizer")]
struct Cli {
    /// Reference directory: one subdirectory per sign
    #[arg(long, default_value = "signs")]
    signs_dir: PathBuf,

    /// Engine config file (s-expression plist)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session file to replay (default: stdin)
    #[arg(long)]
    session: Option<PathBuf>,

    /// Capture trigger: command, gesture, or continuous
    #[arg(long)]
    trigger: Option<String>,

    /// Per-frame embedding: features or landmarks
    #[arg(long)]
    embedding: Option<String>,

    /// DTW acceptance threshold (overrides the embedding default)
    #[arg(long)]
    threshold: Option<f32>,

    /// List stored signs and exit
    #[arg(long)]
    list: bool,

    /// Log every control line and response
    #[arg(long)]
    trace: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sign_recognizer=info".into()),
        )
        .init();

    let store = FsReferenceStore::new(&cli.signs_dir);
    if cli.list {
        for name in store.available_signs()? {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = build_config(&cli)?;
    info!(
        "sign-recognizer v{} starting, trigger {}, embedding {}",
        env!("CARGO_PKG_VERSION"),
        config.trigger.as_str(),
        config.embedding
    );

    let engine = Arc::new(
        Engine::new(config, Box::new(store))
            .with_context(|| format!("loading references from {}", cli.signs_dir.display()))?,
    );
    let mut session = Session::new(engine);

    let input: Box<dyn BufRead> = match &cli.session {
        Some(path) => Box::new(BufReader::new(
            File::open(path).with_context(|| format!("opening session {}", path.display()))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for line in input.lines() {
        let line = line?;
        if cli.trace {
            info!("<< {}", line);
        }
        for response in session.handle_line(&line) {
            if cli.trace {
                info!(">> {}", response);
            }
            writeln!(out, "{}", response)?;
        }
    }
    out.flush()?;

    let sentence = session.transcript().sentence();
    if !sentence.is_empty() {
        info!(%sentence, "session finished");
    }
    Ok(())
}

/// Defaults, then the config file, then command-line flags.
fn build_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let embedding = match &cli.embedding {
        Some(name) => match Embedding::parse(name) {
            Some(e) => Some(e),
            None => bail!("unknown embedding: {name}. Use: features or landmarks"),
        },
        None => None,
    };

    let mut config = EngineConfig::layered(cli.config.as_deref(), embedding, cli.threshold)
        .with_context(|| match &cli.config {
            Some(path) => format!("loading config {}", path.display()),
            None => "invalid engine configuration".to_string(),
        })?;
    if let Some(trigger) = &cli.trigger {
        config.trigger = match TriggerMode::parse(trigger) {
            Some(t) => t,
            None => bail!("unknown trigger: {trigger}. Use: command, gesture, or continuous"),
        };
    }
    Ok(config)
}
