use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use faq_search::cli::{self, Command};
use faq_search::config::{self, Config};
use faq_search::corpus::Corpus;
use faq_search::search::{EmbeddingModel, EngineOptions, FaqEngine};
use faq_search::web;

fn build_engine(
    config: &Config,
    corpus_override: Option<&Path>,
    rebuild_cache: bool,
) -> anyhow::Result<FaqEngine> {
    let corpus_path = match corpus_override {
        Some(path) => path.to_path_buf(),
        None => config.corpus_path(),
    };
    let corpus = Corpus::load(&corpus_path)
        .with_context(|| format!("failed to load corpus {}", corpus_path.display()))?;

    let model = EmbeddingModel::new(
        &config.embedding.model,
        config.models_dir(),
        config.embedding.show_download_progress,
    )
    .context("failed to load embedding model")?;

    let options = EngineOptions {
        rebuild_cache,
        ..config.engine_options()
    };
    FaqEngine::new(corpus, Box::new(model), options)
        .context("failed to build search engine")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = cli::Args::parse();

    let base_path = match args.base_path {
        Some(path) => path,
        None => config::default_base_path()?,
    };
    let config = Config::load_with(&base_path)
        .with_context(|| format!("failed to load config from {}", base_path.display()))?;

    let rebuild_cache = matches!(args.command, Command::Embed { force: true });
    let engine = build_engine(&config, args.corpus.as_deref(), rebuild_cache)?;

    match args.command {
        Command::Search { query, top_k } => {
            let top_k = top_k.unwrap_or_else(|| engine.default_top_k());
            let results = engine.search(&query.join(" "), top_k)?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }

        Command::Suggest { query } => {
            let suggestions = engine.suggestions(&query.join(" "));
            println!("{}", serde_json::to_string_pretty(&suggestions)?);
        }

        Command::Embed { .. } => match config.engine_options().cache_path {
            Some(path) => log::info!(
                "embedding cache {} is up to date ({} entries)",
                path.display(),
                engine.len()
            ),
            None => log::warn!("embedding.cache_file is not set, nothing was cached"),
        },

        Command::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            web::start_daemon(Arc::new(engine), &bind)?;
        }
    }

    Ok(())
}
