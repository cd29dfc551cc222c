//! SmartDoc command-line entrypoint.
//!
//! `process` indexes a document, `ask` answers one question, `chat` runs an interactive loop on
//! stdin, and `serve` exposes the same session over HTTP. Answers go to stdout; progress and
//! logs go to stderr.
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use smartdoc::{
    api, config,
    extraction::{ContentType, Document, TextExtractor},
    logging,
    processing::{PipelineApi, PipelineService, StderrProgress},
    session::{ChatSession, ProcessOutcome},
};
use std::io::{self, Write};
use std::net::Ipv4Addr;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(
    name = "smartdoc",
    about = "Upload a document, index it, and ask questions about it"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract, chunk, and embed a document, replacing the current index.
    Process {
        /// PDF, legacy .doc, or plain-text file.
        file: PathBuf,
        /// Declared MIME type; inferred from the extension when omitted.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Answer a question from the current index.
    Ask {
        /// Question text; multiple words are joined with spaces.
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Interactive chat. Optionally processes FILE first; type /quit to exit.
    Chat {
        /// Document to process before chatting.
        file: Option<PathBuf>,
        /// Declared MIME type for FILE.
        #[arg(long)]
        content_type: Option<String>,
    },
    /// Serve the HTTP API.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing();

    let pipeline =
        Arc::new(PipelineService::from_config(config).context("failed to initialize pipeline")?);
    let session = ChatSession::new(TextExtractor::from_config(config));

    match cli.command {
        Command::Process { file, content_type } => {
            let mut session = session;
            let document = load_document(&file, content_type).await?;
            session.upload(document);
            let outcome = session
                .process(pipeline.as_ref(), &StderrProgress)
                .await
                .context("failed to build index")?;
            print_outcome(&file, &outcome);
        }
        Command::Ask { question } => {
            let answer = pipeline
                .answer(&question.join(" "))
                .await
                .context("failed to answer question")?;
            println!("{}", answer.answer);
        }
        Command::Chat { file, content_type } => {
            run_chat(pipeline, session, file, content_type).await?;
        }
        Command::Serve => {
            let app = api::create_router(pipeline, session);
            let (listener, port) = bind_listener(config.server_port)
                .await
                .context("failed to bind listener")?;
            tracing::info!("Listening on http://0.0.0.0:{}", port);
            axum::serve(listener, app)
                .await
                .context("HTTP server terminated unexpectedly")?;
        }
    }

    Ok(())
}

async fn load_document(path: &Path, content_type: Option<String>) -> Result<Document> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let content_type = content_type.unwrap_or_else(|| match ContentType::from_path(path) {
        Some(kind) => kind.mime().to_string(),
        None => {
            tracing::warn!(
                path = %path.display(),
                "Unrecognized extension; no text will be extracted"
            );
            "application/octet-stream".to_string()
        }
    });
    let mut document = Document::new(bytes, content_type);
    if let Some(name) = path.file_name().and_then(|name| name.to_str()) {
        document = document.with_file_name(name);
    }
    Ok(document)
}

fn print_outcome(file: &Path, outcome: &ProcessOutcome) {
    match outcome {
        ProcessOutcome::Indexed(build) => println!(
            "Indexed {} chunks from {} into {}",
            build.chunk_count,
            file.display(),
            build.index_path.display()
        ),
        ProcessOutcome::NothingToIndex => println!(
            "No text extracted from {}; index left unchanged",
            file.display()
        ),
    }
}

async fn run_chat(
    pipeline: Arc<PipelineService>,
    mut session: ChatSession,
    file: Option<PathBuf>,
    content_type: Option<String>,
) -> Result<()> {
    if let Some(file) = file {
        let document = load_document(&file, content_type).await?;
        session.upload(document);
        let outcome = session
            .process(pipeline.as_ref(), &StderrProgress)
            .await
            .context("failed to build index")?;
        print_outcome(&file, &outcome);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        let _ = std::io::stderr().flush();
        let Some(line) = lines.next_line().await.context("failed to read stdin")? else {
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/quit" {
            break;
        }
        match session.ask(pipeline.as_ref(), question).await {
            Ok(answer) => println!("{answer}"),
            Err(error) => eprintln!("error: {error}"),
        }
    }
    Ok(())
}

/// Ports scanned when `SERVER_PORT` is unset.
const FALLBACK_PORTS: RangeInclusive<u16> = 4100..=4199;

/// Bind the configured port, or the first free one in [`FALLBACK_PORTS`].
async fn bind_listener(server_port: Option<u16>) -> io::Result<(TcpListener, u16)> {
    match server_port {
        Some(port) => {
            let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await?;
            Ok((listener, port))
        }
        None => first_free_port(FALLBACK_PORTS).await,
    }
}

async fn first_free_port(ports: RangeInclusive<u16>) -> io::Result<(TcpListener, u16)> {
    let (first, last) = (*ports.start(), *ports.end());
    for port in ports {
        match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)).await {
            Ok(listener) => return Ok((listener, port)),
            Err(error) if error.kind() == io::ErrorKind::AddrInUse => {
                tracing::debug!(port, "Port taken");
            }
            Err(error) => return Err(error),
        }
    }
    Err(io::Error::new(
        io::ErrorKind::AddrNotAvailable,
        format!("every port in {first}-{last} is in use"),
    ))
}
