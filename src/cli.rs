use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Directory holding config.yaml, the embedding cache and models.
    /// Defaults to $FAQ_SEARCH_BASE_PATH or ~/.local/share/faq-search
    #[clap(long, global = true)]
    pub base_path: Option<PathBuf>,

    /// FAQ corpus file, overrides `corpus_path` from the config
    #[clap(long, global = true)]
    pub corpus: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Search the FAQ and print ranked results as JSON
    Search {
        /// Free-text query
        #[clap(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Number of results. Config default when omitted
        #[clap(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Print questions resembling the query as JSON
    Suggest {
        #[clap(required = true, trailing_var_arg = true)]
        query: Vec<String>,
    },
    /// Build or refresh the embedding cache and exit
    Embed {
        /// Discard the existing cache and embed every question again
        #[clap(long)]
        force: bool,
    },
    /// Start the HTTP server.
    Serve {
        /// Address to listen on, overrides `server.bind`
        #[clap(short, long)]
        bind: Option<String>,
    },
}
