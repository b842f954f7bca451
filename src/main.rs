use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

mod aggregate;
mod cache;
mod config;
mod error;
mod logging;
mod models;
mod normalize;
mod reconcile;
mod report;
mod source;

use cache::TtlCache;
use config::{Settings, SourceArgs};
use error::DashboardError;
use normalize::Dataset;
use report::Page;
use source::Snapshot;

#[derive(Parser)]
#[command(name = "club-roster-dashboard")]
#[command(about = "Club sign-up dashboard cross-referenced with the student roster", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,
    /// Directory to write CSV downloads into
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    View(View),
    /// Read view commands from stdin, reusing fetched sheets within the cache window
    Shell,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
enum View {
    /// Headline metrics and participation breakdowns
    Dashboard {
        #[arg(long)]
        json: bool,
    },
    /// Look up form responses by registration number
    Search { reg_no: String },
    /// List clubs, or the members of one club
    Club {
        name: Option<String>,
        #[arg(long)]
        year: Option<i64>,
    },
    /// Students who joined at least one club
    Joined,
    /// Roster students with no form response, per year
    NotResponded,
    /// Registration numbers submitted more than once
    Duplicates,
    /// Link to the sign-up form
    FormLink,
}

#[derive(Parser)]
#[command(name = "shell", no_binary_name = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

#[derive(Subcommand)]
enum ShellCommand {
    #[command(flatten)]
    View(View),
    /// Drop cached sheets so the next command fetches again
    Refresh,
    /// End the session
    #[command(alias = "exit")]
    Quit,
}

struct Session {
    client: reqwest::Client,
    settings: Settings,
    cache: TtlCache<Snapshot>,
    out: Option<PathBuf>,
}

impl Session {
    fn new(settings: Settings, out: Option<PathBuf>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Session {
            client,
            cache: TtlCache::new(settings.cache_ttl),
            settings,
            out,
        })
    }

    async fn dataset(&mut self) -> anyhow::Result<Dataset> {
        let (responses, students) = self.settings.sources()?;
        let client = &self.client;
        let snapshot = self
            .cache
            .get_or_refresh(Utc::now(), || {
                source::fetch_snapshot(client, responses, students)
            })
            .await
            .context("failed to load source sheets")?;
        let data = Dataset::from_snapshot(snapshot);
        if let Some(fetched_at) = self.cache.fetched_at() {
            debug!(%fetched_at, "using sheets fetched at");
        }
        Ok(data)
    }

    async fn render(&mut self, view: &View) -> anyhow::Result<Page> {
        if let View::FormLink = view {
            return Ok(report::form_link_page(self.settings.activity_form.as_deref()));
        }

        let data = self.dataset().await?;
        let page = match view {
            View::Dashboard { json: false } => report::dashboard_page(&data),
            View::Dashboard { json: true } => {
                let summary = report::dashboard_summary(&data);
                let mut text = serde_json::to_string_pretty(&summary)?;
                text.push('\n');
                Page {
                    text,
                    exports: Vec::new(),
                }
            }
            View::Search { reg_no } => report::search_page(&data, reg_no)?,
            View::Club { name: None, .. } => report::club_catalogue_page(&data)?,
            View::Club {
                name: Some(name),
                year,
            } => report::club_page(&data, name, *year)?,
            View::Joined => report::joined_page(&data)?,
            View::NotResponded => report::non_responded_page(&data)?,
            View::Duplicates => report::duplicates_page(&data)?,
            View::FormLink => report::form_link_page(self.settings.activity_form.as_deref()),
        };
        Ok(page)
    }

    /// Renders one view to stdout. Problems confined to the view are shown
    /// as notices; anything else is returned.
    async fn run(&mut self, view: &View) -> anyhow::Result<()> {
        info!(?view, "rendering view");
        let page = match self.render(view).await {
            Ok(page) => page,
            Err(err) => match err.downcast_ref::<DashboardError>() {
                Some(local) if local.is_view_local() => {
                    warn!(error = %local, "view unavailable");
                    println!("{}", report::notice(local));
                    return Ok(());
                }
                _ => return Err(err),
            },
        };

        print!("{}", page.text);
        match &self.out {
            Some(dir) => {
                for export in &page.exports {
                    let path = write_export(dir, &export.file_name, &export.bytes).await?;
                    println!("Wrote {}.", path.display());
                }
            }
            None => {
                for export in &page.exports {
                    println!("Download available: {} (pass --out DIR to save)", export.file_name);
                }
            }
        }
        Ok(())
    }
}

async fn write_export(dir: &Path, file_name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Splits a shell line on whitespace, honouring single and double quotes.
fn split_words(line: &str) -> Result<Vec<String>, String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_word = false;
    let mut quote: Option<char> = None;

    for ch in line.chars() {
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => current.push(ch),
            None if ch == '"' || ch == '\'' => {
                quote = Some(ch);
                in_word = true;
            }
            None if ch.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(ch);
                in_word = true;
            }
        }
    }

    if let Some(q) = quote {
        return Err(format!("unterminated {q} quote"));
    }
    if in_word {
        words.push(current);
    }
    Ok(words)
}

async fn run_shell(session: &mut Session) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let words = match split_words(&line) {
            Ok(words) if words.is_empty() => continue,
            Ok(words) => words,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };

        let parsed = match ShellLine::try_parse_from(words) {
            Ok(parsed) => parsed,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };

        match parsed.command {
            ShellCommand::View(view) => {
                if let Err(err) = session.run(&view).await {
                    eprintln!("Error: {err:#}");
                }
            }
            ShellCommand::Refresh => {
                session.cache.invalidate();
                println!("Cached sheets dropped.");
            }
            ShellCommand::Quit => break,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();
    let settings = cli.sources.resolve()?;
    let mut session = Session::new(settings, cli.out)?;

    match cli.command {
        Commands::View(view) => session.run(&view).await?,
        Commands::Shell => run_shell(&mut session).await?,
    }

    Ok(())
}
