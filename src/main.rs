//! TextLift CLI
//!
//! Command-line front end for the TextLift annotation service: log in,
//! upload PDFs with content deduplication, and inspect documents.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use textlift::session::{FileStore, SessionStore};
use textlift::upload::{Interest, UploadPhase};
use textlift::{
    Access, AuthenticatedTransport, ClientError, Config, PersistentCookieJar, ReqwestClient,
    RouteGuard, TextliftApi, UploadFile, UploadOutcome,
};

#[derive(Parser)]
#[command(name = "textlift")]
#[command(about = "Upload PDFs to TextLift and fetch their annotations")]
struct Cli {
    /// API base URL (overrides TEXTLIFT_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TEXTLIFT_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "TEXTLIFT_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long)]
        full_name: String,
    },
    /// End the session
    Logout,
    /// Show local session state
    Session,
    /// Upload a PDF
    Upload { file: PathBuf },
    /// Show the server-side status of an upload
    Status { upload_id: String },
    /// List uploaded documents
    Uploads,
    /// Delete an uploaded document
    Delete { document_id: String },
    /// Fetch annotations for a document
    Annotations { document_id: String },
}

impl Command {
    fn is_protected(&self) -> bool {
        !matches!(
            self,
            Command::Login { .. } | Command::Signup { .. } | Command::Logout | Command::Session
        )
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textlift=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Invalid configuration");
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = &cli.api_url {
        config.api.base_url = url.clone();
    }

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<ExitCode> {
    tracing::debug!(api = %config.api.base_url, session_file = %config.session.file.display(), "Starting");

    let store = Arc::new(FileStore::open(&config.session.file));
    let jar = Arc::new(PersistentCookieJar::new(store.clone()));
    let session = Arc::new(
        SessionStore::new(store, config.session.mode).with_skew(config.session.skew()),
    );
    let client = ReqwestClient::with_cookie_jar(&config.api.base_url, config.api.timeout(), jar)
        .context("failed to create HTTP client")?;
    let transport = AuthenticatedTransport::with_options(
        Arc::new(client),
        session.clone(),
        config.session.clear_on_forbidden,
        config.session.login_path.clone(),
    );
    let api = TextliftApi::new(transport, config.session.ttl());

    if cli.command.is_protected() {
        let guard = RouteGuard::with_login_path(session.clone(), config.session.login_path.clone());
        if let Access::Redirect(target) = guard.check_access() {
            eprintln!("Not logged in (redirect: {}). Run `textlift login` first.", target);
            return Ok(ExitCode::from(2));
        }
    }

    let result = execute(&api, cli.command, cli.json).await;
    match result {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) if e.is_unauthenticated() => {
            eprintln!("Session expired or rejected. Run `textlift login` again.");
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}

async fn execute(api: &TextliftApi, command: Command, json: bool) -> Result<(), ClientError> {
    match command {
        Command::Login { email, password } => {
            api.login(&email, &password).await?;
            println!("Logged in as {}", email);
        }
        Command::Signup {
            email,
            password,
            full_name,
        } => {
            api.signup(&email, &password, &full_name).await?;
            println!("Account created for {}. Log in to continue.", email);
        }
        Command::Logout => {
            api.logout().await?;
            println!("Logged out");
        }
        Command::Session => {
            let session = api.session();
            let state = session.session();
            if json {
                let value = serde_json::json!({
                    "mode": session.mode(),
                    "valid": session.is_valid(),
                    "expiresAt": state.expires_at,
                });
                println!("{}", value);
            } else {
                println!("Mode:       {}", session.mode());
                println!("Valid:      {}", session.is_valid());
                match state.expires_at {
                    Some(at) => println!("Expires at: {}", at.to_rfc3339()),
                    None => println!("Expires at: -"),
                }
            }
        }
        Command::Upload { file } => {
            let upload = UploadFile::open(&file).await?;
            let outcome = api
                .uploader()
                .upload_with(&upload, &Interest::new(), |phase| report_phase(phase))
                .await?;
            print_outcome(&outcome, json);
        }
        Command::Status { upload_id } => {
            let status = api.uploader().poll_status(&upload_id).await?;
            if json {
                println!("{}", serde_json::json!({ "uploadId": upload_id, "uploadStatus": status }));
            } else {
                println!("{}: {}", upload_id, status);
            }
        }
        Command::Uploads => {
            let uploads = api.uploads().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&uploads).unwrap_or_default());
            } else if uploads.is_empty() {
                println!("No uploads yet.");
            } else {
                for doc in uploads {
                    println!(
                        "{}  {:<24}  {}",
                        doc.document_id,
                        doc.document_status.to_string(),
                        doc.text_book_title.as_deref().unwrap_or("(unidentified)")
                    );
                }
            }
        }
        Command::Delete { document_id } => {
            api.delete_upload(&document_id).await?;
            println!("Deleted {}", document_id);
        }
        Command::Annotations { document_id } => {
            let annotations = api.annotations(&document_id).await?;
            println!("{}", serde_json::to_string_pretty(&annotations).unwrap_or_default());
        }
    }

    Ok(())
}

fn report_phase(phase: &UploadPhase) {
    match phase {
        UploadPhase::Fingerprinting => eprintln!("Preparing upload..."),
        UploadPhase::Transferring { .. } => eprintln!("Uploading file, please wait..."),
        _ => {}
    }
}

fn print_outcome(outcome: &UploadOutcome, json: bool) {
    if json {
        let value = match outcome {
            UploadOutcome::Existing { document_id } => {
                serde_json::json!({ "mode": "CACHE_HIT", "documentId": document_id })
            }
            UploadOutcome::InProgress => serde_json::json!({ "mode": "CACHE_HIT_WAIT" }),
            UploadOutcome::Uploaded(result) => serde_json::json!({
                "mode": "NEW_UPLOAD",
                "documentId": result.document_id,
                "documentStatus": result.document_status,
            }),
        };
        println!("{}", value);
        return;
    }

    match outcome {
        UploadOutcome::Existing { document_id } => {
            println!("Already processed. Document: {}", document_id);
        }
        UploadOutcome::InProgress => {
            println!("This file is already being processed. Check back soon.");
        }
        UploadOutcome::Uploaded(result) => {
            println!(
                "File uploaded successfully! Document {} is {}. Check back later for annotations.",
                result.document_id, result.document_status
            );
        }
    }
}
