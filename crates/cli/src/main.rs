//! `lexcms` -- command-line front end for the page editor.
//!
//! Opens one page through the content API, performs a single action and
//! prints the notices it produced.
//!
//! # Environment variables
//!
//! | Variable                      | Required | Default                     | Description                        |
//! |-------------------------------|----------|-----------------------------|------------------------------------|
//! | `LEXCMS_API_URL`              | no       | `http://localhost:3000/api` | Content API base URL               |
//! | `LEXCMS_API_TOKEN`            | no       | --                          | Bearer token                       |
//! | `LEXCMS_REQUEST_TIMEOUT_SECS` | no       | `30`                        | Per-request timeout                |
//! | `LEXCMS_CAPABILITIES`         | no       | all                         | Comma-separated granted capabilities |
//! | `RUST_LOG`                    | no       | `lexcms=info`               | Log filter                         |

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lexcms_client::{ClientConfig, HttpPagesApi, PagesApi};
use lexcms_core::content::BlockType;
use lexcms_core::draft::{new_block, DraftEdit};
use lexcms_core::history::{presentation, timeline, TimelineEntry};
use lexcms_core::locale::Locale;
use lexcms_core::permissions::CapabilitySet;
use lexcms_core::workflow::WorkflowRecord;
use lexcms_editor::bulk::bulk_publish;
use lexcms_editor::{EditorConfig, EditorSession, Notice, NoticeBus, NoticeLevel};

#[derive(Parser)]
#[command(name = "lexcms")]
#[command(about = "Edit and publish lexcms pages", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a page with its workflow state and available actions
    Show {
        slug: String,
        /// Print the raw page as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print workflow events and saved versions in order
    History { slug: String },
    /// Change the title or one block value and save the draft
    Edit {
        slug: String,
        /// Block key to edit
        #[arg(long, conflicts_with = "title", required_unless_present = "title")]
        block: Option<String>,
        /// Edit the page title instead of a block
        #[arg(long)]
        title: bool,
        #[arg(long, default_value = "en")]
        locale: Locale,
        /// Block type; creates the block when the key is new
        #[arg(long = "type")]
        block_type: Option<BlockType>,
        /// New value as it would be typed in the editor form
        value: String,
    },
    /// Render the current draft and print the preview URL
    Preview { slug: String },
    /// Submit the page for review
    RequestApproval { slug: String },
    /// Approve a page under review and publish it
    Approve { slug: String },
    /// Send a page under review back to draft
    Reject {
        slug: String,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Publish without review
    Publish { slug: String },
    /// Publish at a later time
    Schedule {
        slug: String,
        /// RFC 3339 timestamp, e.g. 2026-11-01T09:00:00Z
        #[arg(long)]
        at: DateTime<Utc>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Cancel a scheduled publish
    CancelSchedule { slug: String },
    /// Publish several pages at once
    BulkPublish {
        #[arg(required = true)]
        slugs: Vec<String>,
    },
}

impl Commands {
    fn page_slug(&self) -> Option<&str> {
        match self {
            Commands::Show { slug, .. }
            | Commands::History { slug }
            | Commands::Edit { slug, .. }
            | Commands::Preview { slug }
            | Commands::RequestApproval { slug }
            | Commands::Approve { slug }
            | Commands::Reject { slug, .. }
            | Commands::Publish { slug }
            | Commands::Schedule { slug, .. }
            | Commands::CancelSchedule { slug } => Some(slug),
            Commands::BulkPublish { .. } => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lexcms=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let client_config = ClientConfig::from_env().context("Invalid API configuration")?;
    // One-shot commands save explicitly.
    let editor_config = EditorConfig {
        autosave_enabled: false,
        ..EditorConfig::from_env().context("Invalid editor configuration")?
    };
    let permissions = match std::env::var("LEXCMS_CAPABILITIES") {
        Ok(list) => CapabilitySet::parse(&list).context("Invalid LEXCMS_CAPABILITIES")?,
        Err(_) => CapabilitySet::all(),
    };

    let http = HttpPagesApi::from_config(&client_config)?;
    tracing::debug!(api_url = %http.api_url(), capabilities = permissions.len(), "Starting lexcms");

    let api: Arc<dyn PagesApi> = Arc::new(http);
    let notices = NoticeBus::default();
    let mut rx = notices.subscribe();

    let result = run(cli.command, api, Arc::new(permissions), notices, &editor_config).await;
    print_notices(&mut rx);
    result
}

async fn run(
    command: Commands,
    api: Arc<dyn PagesApi>,
    permissions: Arc<CapabilitySet>,
    notices: NoticeBus,
    config: &EditorConfig,
) -> Result<()> {
    let slug = match command {
        Commands::BulkPublish { ref slugs } => {
            let outcome = bulk_publish(api.as_ref(), permissions.as_ref(), &notices, slugs).await?;
            for slug in &outcome.published {
                println!("published  {slug}");
            }
            for failure in &outcome.failed {
                println!("failed     {}: {}", failure.slug, failure.error);
            }
            return Ok(());
        }
        ref other => other
            .page_slug()
            .context("Command does not target a page")?
            .to_string(),
    };

    let session = EditorSession::open(slug, api, permissions, notices, config).await?;
    let outcome = execute(&session, command).await;
    session.close().await;
    outcome
}

async fn execute(session: &EditorSession, command: Commands) -> Result<()> {
    match command {
        Commands::Show { json, .. } => show(session, json).await,
        Commands::History { .. } => history(session).await,
        Commands::Edit {
            block,
            title,
            locale,
            block_type,
            value,
            ..
        } => {
            let edits = if title {
                vec![DraftEdit::Title {
                    locale,
                    text: value,
                }]
            } else {
                let key = block.context("--block is required")?;
                block_edits(session, &key, locale, block_type, value).await?
            };
            for edit in edits {
                session.mutate(edit).await?;
            }
            session.save().await?;
            Ok(())
        }
        Commands::Preview { .. } => {
            println!("{}", session.request_preview(false).await?);
            Ok(())
        }
        Commands::RequestApproval { .. } => print_state(session.request_approval().await?),
        Commands::Approve { .. } => print_state(session.approve_and_publish().await?),
        Commands::Reject { notes, .. } => print_state(session.reject(notes).await?),
        Commands::Publish { .. } => print_state(session.publish_directly().await?),
        Commands::Schedule { at, notes, .. } => print_state(session.schedule_publish(at, notes).await?),
        Commands::CancelSchedule { .. } => print_state(session.cancel_schedule().await?),
        Commands::BulkPublish { .. } => bail!("bulk-publish does not operate on a single page"),
    }
}

/// Edits that set `key` to `value`, creating or re-typing the block first
/// when `block_type` asks for it.
async fn block_edits(
    session: &EditorSession,
    key: &str,
    locale: Locale,
    block_type: Option<BlockType>,
    value: String,
) -> Result<Vec<DraftEdit>> {
    let draft = session.draft().await;
    let existing = draft.blocks().iter().position(|b| b.key == key);

    let mut edits = Vec::new();
    let index = match (existing, block_type) {
        (Some(index), Some(block_type)) if draft.blocks()[index].block_type() != block_type => {
            edits.push(DraftEdit::BlockType { index, block_type });
            index
        }
        (Some(index), _) => index,
        (None, Some(block_type)) => {
            edits.push(DraftEdit::AddBlock {
                block: new_block(key, block_type),
            });
            draft.blocks().len()
        }
        (None, None) => bail!("Page has no block '{key}'; pass --type to create it"),
    };
    edits.push(DraftEdit::BlockValue {
        index,
        locale,
        text: value,
    });
    Ok(edits)
}

async fn show(session: &EditorSession, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&session.page().await)?);
        return Ok(());
    }

    let draft = session.draft().await;
    let view = session.workflow_view().await;
    println!("{}", session.slug());
    for locale in Locale::ALL {
        println!(
            "  title[{locale}]: {}",
            draft.title().get(locale).map(String::as_str).unwrap_or("")
        );
    }
    println!("  status: {}", session.page_status().await.as_str());
    println!("  workflow: {}", view.state);
    if !session.can_edit() {
        println!("  (read-only)");
    }
    if view.has_unpublished_changes {
        println!("  (has unpublished changes)");
    }
    if let Some(at) = session.workflow().await.and_then(|w| w.scheduled_for) {
        println!("  scheduled for: {}", at.to_rfc3339());
    }

    println!("  blocks:");
    for (i, block) in draft.blocks().iter().enumerate() {
        println!("    {}. {} ({})", i + 1, block.key, block.block_type());
        for locale in Locale::ALL {
            let text = block.content.form_text(locale);
            if !text.is_empty() {
                println!("       {locale}: {}", text.replace('\n', "\n           "));
            }
        }
    }

    let actions: Vec<_> = session
        .available_actions()
        .await
        .into_iter()
        .map(|a| a.label())
        .collect();
    println!("  actions: {}", actions.join(", "));
    Ok(())
}

async fn history(session: &EditorSession) -> Result<()> {
    let versions = session.history(true).await?;
    let events = session.events().await;
    for entry in timeline(&events, &versions) {
        let icon = match entry {
            TimelineEntry::Event(e) => presentation(&e.kind).icon,
            TimelineEntry::Version(_) => "save",
        };
        println!(
            "{}  {:<8} {}",
            entry.timestamp().format("%Y-%m-%d %H:%M"),
            icon,
            entry.summary()
        );
    }
    Ok(())
}

fn print_state(record: WorkflowRecord) -> Result<()> {
    match record.scheduled_for {
        Some(at) => println!("{} ({})", record.state, at.to_rfc3339()),
        None => println!("{}", record.state),
    }
    Ok(())
}

fn print_notices(rx: &mut broadcast::Receiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        let level = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        eprintln!("[{level}] {}", notice.message);
    }
}
