//! # campus CLI
//!
//! The `campus` binary drives the course-material assistant: database
//! setup, document ingestion and deletion, scoped questions, summaries,
//! quizzes, reporting, and the HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! campus --config ./config/campus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `campus init` | Create the SQLite database and run schema migrations |
//! | `campus ingest <path>` | Extract, chunk, embed and store a document under a scope |
//! | `campus delete <hash>` | Remove a document's chunks, vectors and ledger entry |
//! | `campus ask "<question>"` | Answer from the documents visible to a scope |
//! | `campus retrieve "<question>"` | Show the context retrieval would select |
//! | `campus summarize <hash>...` | Summarize one or more documents |
//! | `campus quiz <hash>...` | Generate multiple-choice questions |
//! | `campus documents` | List indexed documents |
//! | `campus stats` | Distinct-document counts per scope level |
//! | `campus history` | Chat log visible to a profile |
//! | `campus info <hash>` | Show one stored document |
//! | `campus serve` | Start the HTTP server |
//!
//! Scopes are given as six comma-separated ids:
//! `department,program,module,activity,profile,user`.
//!
//! ```bash
//! campus ingest ./cours/reseaux.pdf --scope 1,2,3,4,3,42
//! campus ask "Qu'est-ce que TCP ?" --scope 1,2,3,4,3,42
//! campus quiz 9f86d081884c7d65... --count 5 --bloom application
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use campus_rag::services::Services;
use campus_rag::{chat, config, info, ingest, logging, migrate, server, stats, study};
use campus_rag_core::models::{BloomLevel, DetailLevel, Scope};

/// campus: a scope-aware retrieval assistant for course material.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/campus.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "campus", version, about)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/campus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database (create tables)
    Init,

    /// Ingest a document (.txt, .md, .json, .pdf, .docx)
    Ingest {
        /// File to ingest
        path: PathBuf,

        /// Name to record for the document (defaults to the file name)
        #[arg(long)]
        name: Option<String>,

        /// department,program,module,activity,profile,user
        #[arg(long)]
        scope: Scope,

        /// Reprocess even if the content hash was already seen
        #[arg(long)]
        force: bool,
    },

    /// Delete a document by content hash
    Delete {
        hash: String,
    },

    /// Ask a question answered from the documents in scope
    Ask {
        question: String,

        #[arg(long)]
        scope: Scope,
    },

    /// Show the chunks retrieval would select for a question
    Retrieve {
        question: String,

        #[arg(long)]
        scope: Scope,

        /// Override the configured number of candidates
        #[arg(long)]
        top_k: Option<usize>,

        /// Override the configured similarity threshold
        #[arg(long)]
        threshold: Option<f32>,
    },

    /// Summarize one or more documents
    Summarize {
        #[arg(required = true)]
        hashes: Vec<String>,

        /// simplified or detailed
        #[arg(long, default_value = "simplified")]
        level: DetailLevel,
    },

    /// Generate a multiple-choice quiz from one or more documents
    Quiz {
        #[arg(required = true)]
        hashes: Vec<String>,

        /// Number of questions to request
        #[arg(long, default_value_t = 5)]
        count: usize,

        /// knowledge, comprehension or application
        #[arg(long)]
        bloom: Option<BloomLevel>,

        /// Print the questions as JSON
        #[arg(long)]
        json: bool,
    },

    /// List indexed documents
    Documents,

    /// Show ingestion statistics
    Stats,

    /// Show the chat history visible to a profile
    History {
        /// 1 = administrator, 2 = teacher, 3 = student
        #[arg(long)]
        profile: i64,

        #[arg(long)]
        department: Option<i64>,

        #[arg(long)]
        program: Option<i64>,
    },

    /// Show a stored document by content hash
    Info {
        hash: String,
    },

    /// Start the HTTP server
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    logging::init(&cfg.logging.level);

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        command => {
            let services = Services::build(&cfg).await?;
            run(&services, command).await?;
        }
    }

    Ok(())
}

async fn run(services: &Services, command: Commands) -> Result<()> {
    match command {
        Commands::Ingest {
            path,
            name,
            scope,
            force,
        } => {
            let name = name.unwrap_or_else(|| {
                path.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            });
            let outcome = services
                .ingestor
                .ingest_file(&name, &path, scope, force)
                .await;
            ingest::print_outcome(&name, &outcome);
            if let ingest::IngestOutcome::Failed { message } = outcome {
                anyhow::bail!(message);
            }
        }
        Commands::Delete { hash } => {
            let report = services.ingestor.delete_document(&hash).await?;
            println!(
                "deleted {}: {} vector(s), {} metadata row(s)",
                hash, report.vectors_deleted, report.metadata_deleted
            );
        }
        Commands::Ask { question, scope } => {
            chat::run_ask(services, &question, &scope).await?;
        }
        Commands::Retrieve {
            question,
            scope,
            top_k,
            threshold,
        } => {
            chat::run_retrieve(services, &question, &scope, top_k, threshold).await?;
        }
        Commands::Summarize { hashes, level } => {
            study::run_summarize(services, &hashes, level).await?;
        }
        Commands::Quiz {
            hashes,
            count,
            bloom,
            json,
        } => {
            study::run_quiz(services, &hashes, count, bloom, json).await?;
        }
        Commands::Documents => {
            stats::run_documents(services).await?;
        }
        Commands::Stats => {
            stats::run_stats(services).await?;
        }
        Commands::History {
            profile,
            department,
            program,
        } => {
            chat::run_history(services, profile, department, program).await?;
        }
        Commands::Info { hash } => {
            info::run_info(services, &hash).await?;
        }
        Commands::Init | Commands::Serve => {}
    }
    Ok(())
}
