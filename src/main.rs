//! # Error Guide CLI (`errguide`)
//!
//! The `errguide` binary runs the HTTP API, the MCP stdio server, and the
//! offline corpus tools (matching, search, export, and evaluation).
//!
//! ## Usage
//!
//! ```bash
//! errguide --config ./config/guide.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `errguide serve` | Start the HTTP server |
//! | `errguide mcp` | Serve the guide's tools over MCP stdio |
//! | `errguide chat "<message>"` | Ask a grounded question through a provider |
//! | `errguide match "<query>"` | Rank corpus records against a query |
//! | `errguide search "<query>"` | All-terms keyword search |
//! | `errguide categories` | List categories with counts |
//! | `errguide get <id>` | Show one error with its solutions |
//! | `errguide export` | Write `error-index.json`, `llms.txt`, `llms-full.txt` |
//! | `errguide eval` | Measure how well matching finds each record |
//! | `errguide completions <shell>` | Print shell completions |

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use error_guide::catalog::{run_categories, run_get};
use error_guide::chat::{ChatRequest, ChatService};
use error_guide::config::{self, Config};
use error_guide::corpus::KnowledgeBase;
use error_guide::eval::run_eval;
use error_guide::export::run_export;
use error_guide::logging::init_logging;
use error_guide::mcp::run_mcp_stdio;
use error_guide::provider::Providers;
use error_guide::search::{run_match, run_search};
use error_guide::server::run_server;
use error_guide_core::ResponseCache;

/// Error Guide CLI: match, search, and chat over a corpus of known
/// installation errors.
///
/// All commands except `completions` read a TOML configuration file given
/// by `--config`. See `config/guide.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "errguide",
    about = "Error Guide: a knowledge base of installation errors with grounded LLM chat",
    version,
    long_about = "Error Guide loads a structured corpus of known errors, ranks them against \
    free-text problem descriptions, and answers questions through OpenAI, Anthropic, Gemini, \
    or Groq with the best-matching records as context. It serves an HTTP API and an MCP \
    stdio server, and exports static search artifacts."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/guide.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind` and serves the chat, search, errors,
    /// feedback, webhook, and tool endpoints.
    Serve,

    /// Serve the built-in tools over MCP stdio.
    ///
    /// Intended to be launched by an editor or agent as a subprocess.
    Mcp,

    /// Ask a question and print the grounded answer.
    Chat {
        /// The question or error message.
        message: String,

        /// Provider name: openai, anthropic, gemini, or groq.
        #[arg(long)]
        provider: Option<String>,

        /// API key; defaults to the provider's environment variable.
        #[arg(long)]
        api_key: Option<String>,
    },

    /// Rank corpus records against a query.
    Match {
        query: String,

        /// Only show records that pass the strict threshold.
        #[arg(long)]
        strict: bool,

        /// Print the matches as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Keyword search: every term must appear in the record.
    Search { query: String },

    /// List categories with error counts.
    Categories,

    /// Show one error by id.
    Get {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Write static search artifacts.
    Export {
        /// Output directory.
        #[arg(long, default_value = "public")]
        out: PathBuf,
    },

    /// Evaluate matching against generated probe questions.
    Eval {
        /// Also write the full JSON report to this file.
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print shell completions to stdout.
    Completions { shell: Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(
            *shell,
            &mut Cli::command(),
            "errguide",
            &mut std::io::stdout(),
        );
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;
    init_logging(&cfg.logging.level);

    match cli.command {
        Commands::Serve => {
            run_server(&cfg).await?;
        }
        Commands::Mcp => {
            run_mcp_stdio(&cfg).await?;
        }
        Commands::Chat {
            message,
            provider,
            api_key,
        } => {
            let service = chat_service(&cfg)?;
            let response = service
                .chat(ChatRequest {
                    message,
                    provider,
                    api_key,
                    history: Vec::new(),
                })
                .await?;
            println!("{}", response.answer);
            eprintln!("({})", response.provider);
        }
        Commands::Match {
            query,
            strict,
            json,
        } => {
            run_match(&cfg, &query, strict, json)?;
        }
        Commands::Search { query } => {
            run_search(&cfg, &query)?;
        }
        Commands::Categories => {
            run_categories(&cfg)?;
        }
        Commands::Get { id, json } => {
            run_get(&cfg, &id, json)?;
        }
        Commands::Export { out } => {
            run_export(&cfg, &out)?;
        }
        Commands::Eval { report } => {
            run_eval(&cfg, report.as_deref())?;
        }
        Commands::Completions { .. } => unreachable!("handled before config load"),
    }

    Ok(())
}

fn chat_service(cfg: &Config) -> anyhow::Result<ChatService> {
    let kb = Arc::new(KnowledgeBase::load(cfg));
    let cache = Arc::new(ResponseCache::new(
        Duration::from_secs(cfg.cache.ttl_secs),
        cfg.cache.capacity,
    ));
    let providers = Arc::new(Providers::from_config(cfg).context("failed to set up providers")?);
    Ok(ChatService::new(kb, cache, providers, cfg))
}
