//! CLI entry point for `mailharvest`.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailharvest::config::Config;
use mailharvest::export::json;
use mailharvest::harvest::{self, ProgressEvent};
use mailharvest::model::snapshot::MailboxSnapshot;
use mailharvest::session::connect::{ServerCandidate, IMAPS_PORT, IMAP_PORT};
use mailharvest::session::imap_backend::ImapConnector;
use mailharvest::stats::{self, Stats};

#[derive(Parser)]
#[command(
    name = "mailharvest",
    version,
    about = "Download a whole IMAP mailbox into JSON records with statistics"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Login name (usually the full email address)
    #[arg(short, long, global = true, env = "MAILHARVEST_USER")]
    user: Option<String>,

    /// Account password
    #[arg(long, global = true, env = "MAILHARVEST_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// IMAP host to use instead of the configured or derived servers
    #[arg(long, global = true, value_name = "HOST")]
    host: Option<String>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every folder and write the JSON documents (default)
    Fetch {
        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// List the folders on the server without fetching messages
    Folders,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = mailharvest::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    apply_overrides(&mut config, &cli);

    match cli.command {
        Some(Commands::Fetch { output }) => {
            let dir = output.unwrap_or_else(|| config.output.dir.clone());
            cmd_fetch(&config, &dir)
        }
        None => {
            let dir = config.output.dir.clone();
            cmd_fetch(&config, &dir)
        }
        Some(Commands::Folders) => cmd_folders(&config),
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
    }
}

/// Command-line values take precedence over the config file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref user) = cli.user {
        config.account.user = user.clone();
    }
    if let Some(ref password) = cli.password {
        config.account.password = Some(password.clone());
    }
    if let Some(ref host) = cli.host {
        config.servers = vec![
            ServerCandidate::new(host.clone(), IMAPS_PORT, true),
            ServerCandidate::new(host.clone(), IMAP_PORT, false),
        ];
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = mailharvest::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mailharvest.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailharvest", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Harvest the whole mailbox, write the JSON documents and print a summary.
fn cmd_fetch(config: &Config, output: &Path) -> anyhow::Result<()> {
    let (credentials, candidates) = config.preflight()?;
    let connector = ImapConnector::new(config.timeout());

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {prefix:<24!} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let snapshot = harvest::harvest(
        &connector,
        &credentials,
        &candidates,
        Some(&|event: ProgressEvent<'_>| match event {
            ProgressEvent::FolderStarted {
                folder,
                index,
                total,
            } => {
                pb.set_prefix(folder.to_string());
                pb.set_message(format!("({}/{total})", index + 1));
                pb.set_length(0);
                pb.set_position(0);
            }
            ProgressEvent::Message { done, total, .. } => {
                pb.set_length(total as u64);
                pb.set_position(done as u64);
            }
            ProgressEvent::FolderDone { folder, fetched } => {
                pb.println(format!("  {folder}: {fetched} message(s)"));
            }
        }),
    )?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    let stats = stats::compute_with_limits(
        &snapshot,
        config.limits.top_senders,
        config.limits.top_domains,
    );
    let written = json::write_snapshot(output, &snapshot, &stats)?;

    print_summary(&snapshot, &stats, elapsed);
    println!("  {:<20} {}", "Output", output.display());
    println!("  {:<20} {}", "Folder files", written.folders.len());
    println!();

    Ok(())
}

/// Connect and print the folder list.
fn cmd_folders(config: &Config) -> anyhow::Result<()> {
    let (credentials, candidates) = config.preflight()?;
    let connector = ImapConnector::new(config.timeout());

    let folders = harvest::list_remote_folders(&connector, &credentials, &candidates)?;

    println!();
    println!("  {} folder(s)", folders.len());
    println!();
    for folder in &folders {
        println!("    {folder}");
    }
    println!();
    Ok(())
}

/// Print statistics in a human-readable table.
fn print_summary(snapshot: &MailboxSnapshot, stats: &Stats, elapsed: std::time::Duration) {
    use humansize::{format_size, BINARY};

    println!();
    println!("  {:<20} {}", "Messages", stats.total_emails);
    println!("  {:<20} {}", "Folders", stats.folder_counts.len());

    if let (Some(first), Some(last)) = (&stats.date_range.first, &stats.date_range.last) {
        println!(
            "  {:<20} {} - {}",
            "Date range",
            first.get(..10).unwrap_or(first),
            last.get(..10).unwrap_or(last)
        );
    }

    let with_att = snapshot
        .messages()
        .iter()
        .filter(|m| m.has_attachments)
        .count();
    let att_bytes: u64 = snapshot
        .messages()
        .iter()
        .flat_map(|m| &m.attachments)
        .map(|a| a.size_bytes)
        .sum();
    println!(
        "  {:<20} {} ({})",
        "With attachments",
        with_att,
        format_size(att_bytes, BINARY)
    );
    println!("  {:<20} {:.2?}", "Elapsed", elapsed);

    let folders: Vec<(&String, &usize)> = stats
        .folder_counts
        .iter()
        .filter(|(_, count)| **count > 0)
        .collect();
    if !folders.is_empty() {
        println!();
        println!("  Folders:");
        for (folder, count) in folders {
            println!("    {count:>6}  {folder}");
        }
    }

    if !stats.top_senders.is_empty() {
        println!();
        println!("  Top senders:");
        for s in stats.top_senders.iter().take(10) {
            if s.name.is_empty() || s.name == s.email {
                println!("    {:>6}  {}", s.count, s.email);
            } else {
                println!("    {:>6}  {} <{}>", s.count, s.name, s.email);
            }
        }
    }

    if !stats.top_domains.is_empty() {
        println!();
        println!("  Top domains:");
        for d in stats.top_domains.iter().take(10) {
            println!("    {:>6}  {}", d.count, d.domain);
        }
    }
    println!();
}
