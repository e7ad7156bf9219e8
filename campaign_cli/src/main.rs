use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use campaign_core::{
    check_links, load, resolve_campaign, resolve_page, Config, EventLog, Report, Snapshot,
};
use campaign_pages::{CampaignId, EventDraft, PageTitle};

#[derive(Debug, Parser)]
#[command(name = "campaign-overlay", version, about = "Resolve campaign overlays and maintain campaign timelines")]
struct Cli {
    /// Config file; defaults to `overlay.toml` in the vault root when present.
    /// Its roots are taken relative to the file, so it excludes `--root`.
    #[arg(long, global = true, conflicts_with = "root")]
    config: Option<PathBuf>,

    /// Vault root holding `canon/` and `campaigns/`.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print one page as a campaign sees it.
    Preview { campaign: String, title: String },

    /// Resolve every page of a campaign and list its mode.
    Resolve { campaign: String },

    /// Resolve every campaign and report broken links.
    Check,

    /// Append one event to a campaign's log.
    Event {
        campaign: String,
        #[arg(long)]
        session: u32,
        #[arg(long)]
        timestamp: String,
        #[arg(long)]
        summary: String,
        #[arg(long)]
        actor: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Regenerate a campaign's timeline document.
    Timeline { campaign: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;
    init_logging(&config.log_level);
    tracing::debug!(
        canon_root = %config.canon_root.display(),
        campaigns_root = %config.campaigns_root.display(),
        "configuration loaded"
    );

    let mut report = Report::new();
    let outcome = run(cli.command, &config, &mut report);
    eprintln!("{report}");
    outcome
}

fn load_config(cli: &Cli) -> Result<Config> {
    match &cli.config {
        Some(path) => Config::load(path).with_context(|| format!("failed to load config `{}`", path.display())),
        None => Config::discover(&cli.root).context("failed to load config"),
    }
}

fn init_logging(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(command: Command, config: &Config, report: &mut Report) -> Result<()> {
    match command {
        Command::Preview { campaign, title } => {
            let campaign = parse_campaign(&campaign)?;
            let snapshot = load_snapshot(config, report)?;
            let page = resolve_page(&PageTitle::new(title.as_str()), &campaign, &snapshot)
                .with_context(|| format!("cannot resolve `{title}` in campaign `{campaign}`"))?;
            print!("{}", page.render().context("failed to render page")?);
        }
        Command::Resolve { campaign } => {
            let campaign = parse_campaign(&campaign)?;
            let snapshot = load_snapshot(config, report)?;
            if !snapshot.has_campaign(&campaign) {
                bail!("unknown campaign `{campaign}`");
            }
            let view = resolve_campaign(&campaign, &snapshot);
            for page in &view.pages {
                println!("{}\t{}", page.mode.name(), page.title);
            }
            report.merge(view.report);
        }
        Command::Check => {
            let snapshot = load_snapshot(config, report)?;
            let campaigns: Vec<CampaignId> = snapshot.campaigns().cloned().collect();
            for campaign in campaigns {
                let view = resolve_campaign(&campaign, &snapshot);
                let links = check_links(&view, &snapshot);
                println!(
                    "{campaign}: {} pages, {} failed, {} dangling links",
                    view.len(),
                    view.report.failures().count(),
                    links.len()
                );
                report.merge(view.report);
                report.merge(links);
            }
        }
        Command::Event {
            campaign,
            session,
            timestamp,
            summary,
            actor,
            tags,
        } => {
            let mut draft = EventDraft::new(campaign)
                .with_session(session)
                .with_timestamp(timestamp)
                .with_summary(summary);
            if let Some(actor) = actor {
                draft = draft.with_actor(actor);
            }
            for tag in tags {
                draft = draft.with_tag(tag);
            }

            let log = EventLog::from_config(config);
            let outcome = log.append_events([draft]);
            report.merge(outcome.report);
            match outcome.accepted.first() {
                Some(id) => println!("{id}"),
                None => bail!("event rejected"),
            }
        }
        Command::Timeline { campaign } => {
            let campaign = parse_campaign(&campaign)?;
            let log = EventLog::from_config(config);
            let document = log
                .regenerate_timeline(&campaign)
                .with_context(|| format!("failed to regenerate timeline of `{campaign}`"))?;
            let status = if document.changed { "written" } else { "unchanged" };
            println!("{} ({} events, {status})", document.path.display(), document.event_count);
            report.merge(document.report);
        }
    }
    Ok(())
}

fn parse_campaign(raw: &str) -> Result<CampaignId> {
    Ok(CampaignId::new(raw)?)
}

fn load_snapshot(config: &Config, report: &mut Report) -> Result<Snapshot> {
    let snapshot = load(&config.canon_root, &config.campaigns_root).context("failed to load vault")?;
    report.merge(snapshot.report().clone());
    Ok(snapshot)
}
