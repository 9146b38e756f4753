use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use colored::*;
use pdfqa_core::{
    format_date, format_file_size, ApiClient, ApiError, ChatRole, Config, Document, DocumentId,
    DocumentService, DocumentStatus, ExchangeOutcome, Session, UploadFile,
};
use std::path::Path;

#[derive(Parser)]
#[command(name = "pdfqa")]
#[command(about = "Ask questions about your PDF documents", version)]
pub struct Cli {
    /// Document service URL (overrides PDFQA_API_URL and the config file)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the interactive terminal UI (default)
    Tui,
    /// List uploaded documents
    List,
    /// Show details of one document
    Show {
        /// Document id
        id: DocumentId,
    },
    /// Upload a PDF and wait for the service to accept it
    Upload {
        /// Path to a PDF file
        path: String,
    },
    /// Ask a question about a document
    Ask {
        /// Your question
        question: String,
        /// Document id (defaults to the first processed document)
        #[arg(short, long)]
        document: Option<DocumentId>,
    },
    /// Show past questions and answers for a document
    History {
        /// Document id
        id: DocumentId,
    },
    /// Delete a document
    Delete {
        /// Document id
        id: DocumentId,
    },
    /// Show or change the saved configuration
    Config {
        /// Persist a new document service URL
        #[arg(long)]
        set_api_url: Option<String>,
    },
}

fn status_label(doc: &Document) -> ColoredString {
    match doc.status() {
        DocumentStatus::Ready => "ready".green(),
        DocumentStatus::Processing => "processing".yellow(),
        DocumentStatus::Failed(_) => "failed".red(),
    }
}

/// A 404 on a lookup means the id the user typed does not exist
fn lookup_error(err: ApiError, id: DocumentId) -> anyhow::Error {
    if err.is_not_found() {
        anyhow!("Document {} not found. List documents with: pdfqa list", id)
    } else {
        err.into()
    }
}

pub async fn list_documents(client: &ApiClient) -> Result<()> {
    let documents = client.list_documents().await?;

    println!("\n{}", "📄 Documents".bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    if documents.is_empty() {
        println!("{}", "No documents uploaded yet. Try: pdfqa upload <file.pdf>".yellow());
        return Ok(());
    }

    for doc in &documents {
        println!(
            "{:>4}  {}  {}  {}",
            doc.id.to_string().bold(),
            doc.display_name(),
            format_file_size(doc.file_size).dimmed(),
            status_label(doc)
        );
    }
    println!("\n{} documents", documents.len().to_string().bold());

    Ok(())
}

pub async fn show_document(client: &ApiClient, id: DocumentId) -> Result<()> {
    let doc = client
        .get_document(id)
        .await
        .map_err(|e| lookup_error(e, id))?;

    println!("\n{}", doc.display_name().bold().green());
    println!("{}", "=".repeat(40).dimmed());
    println!("{:<12} {}", "Id:".bold(), doc.id);
    println!("{:<12} {}", "File:".bold(), doc.original_filename);
    println!("{:<12} {}", "Size:".bold(), format_file_size(doc.file_size));
    println!("{:<12} {}", "Status:".bold(), status_label(&doc));
    println!("{:<12} {}", "Uploaded:".bold(), format_date(&doc.upload_date));
    if let Some(processed) = &doc.processed_date {
        println!("{:<12} {}", "Processed:".bold(), format_date(processed));
    }
    if let Some(pages) = doc.total_pages {
        println!("{:<12} {}", "Pages:".bold(), pages);
    }
    println!("{:<12} {}", "Chunks:".bold(), doc.chunk_count);
    if let DocumentStatus::Failed(error) = doc.status() {
        println!("{:<12} {}", "Error:".bold(), error.red());
    }

    Ok(())
}

pub async fn upload_document(client: &ApiClient, path: &str) -> Result<()> {
    let file = UploadFile::from_path(Path::new(path)).await?;
    println!("⬆️  Uploading {}...", file.file_name.cyan());

    let mut session = Session::new();
    let doc = session.upload(client, file).await?;

    println!(
        "{} {} (id {}, {})",
        "Uploaded".bold().green(),
        doc.display_name(),
        doc.id,
        format_file_size(doc.file_size)
    );
    if !doc.processed {
        println!(
            "{}",
            "The document is still being processed. Check with: pdfqa list".yellow()
        );
    }

    Ok(())
}

pub async fn ask_question(
    client: &ApiClient,
    question: &str,
    document: Option<DocumentId>,
) -> Result<()> {
    let mut session = Session::new();
    session.refresh(client).await?;

    if let Some(id) = document {
        session.select(id)?;
    }
    let active = session
        .active_document()
        .ok_or_else(|| anyhow!("No processed document available. Upload one first."))?;
    println!("📄 Asking about {}\n", active.display_name().bold().magenta());

    let outcome = session
        .ask(client, question)
        .await
        .ok_or_else(|| anyhow!("Question is empty"))?;

    let answer = session
        .ledger()
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::Assistant)
        .map(|m| m.content.clone())
        .unwrap_or_default();

    match outcome {
        ExchangeOutcome::Resolved => {
            println!("{}", "Answer:".bold().green());
            println!("{}", answer);
            if let Some(stats) = session.last_answer() {
                println!(
                    "\n{}",
                    format!(
                        "{} context chunks · {:.2}s",
                        stats.context_chunks_used, stats.response_time_seconds
                    )
                    .dimmed()
                );
            }
            Ok(())
        }
        _ => bail!(answer),
    }
}

pub async fn show_history(client: &ApiClient, id: DocumentId) -> Result<()> {
    let history = client.history(id).await.map_err(|e| lookup_error(e, id))?;
    let name = history
        .document_filename
        .clone()
        .unwrap_or_else(|| format!("document {}", id));

    println!("\n{}", format!("💬 History for {}", name).bold().blue());
    println!("{}", "=".repeat(40).dimmed());

    if history.conversations.is_empty() {
        println!("{}", "No questions asked yet".yellow());
        return Ok(());
    }

    for record in &history.conversations {
        println!("\n{}", format_date(&record.created_at).dimmed());
        println!("{} {}", "Q:".bold().cyan(), record.question);
        println!("{} {}", "A:".bold().yellow(), record.answer);
    }
    println!("\n{} conversations", history.total.to_string().bold());

    Ok(())
}

pub async fn delete_document(client: &ApiClient, id: DocumentId) -> Result<()> {
    client
        .delete_document(id)
        .await
        .map_err(|e| lookup_error(e, id))?;
    println!("{} document {}", "Deleted".bold().green(), id);
    Ok(())
}

pub fn config(set_api_url: Option<String>) -> Result<()> {
    if let Some(url) = set_api_url {
        // Validate before persisting
        ApiClient::new(&url, Config::new().request_timeout())?;
        Config::save_api_base_url(&url)?;
        println!("{} {}", "Saved service URL".bold().green(), url);
        return Ok(());
    }

    let config = Config::load()?;
    println!("{:<16} {}", "Config file:".bold(), Config::get_config_path()?.display());
    println!("{:<16} {}", "Service URL:".bold(), config.api_base_url());
    println!(
        "{:<16} {}s",
        "Timeout:".bold(),
        config.request_timeout().as_secs()
    );
    if let Some(dir) = config.log_dir() {
        println!("{:<16} {}", "Log directory:".bold(), dir.display());
    }
    Ok(())
}
