//! k8slab - live cluster status and interactive terminals for k8s-lab
//!
//! Seeds the cluster list over HTTP, keeps it current over the live channel
//! and opens interactive terminal sessions on RUNNING clusters.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use k8slab::cli::{ConfigSubcommand, handle_config_command, init_logging};
use k8slab::config::ConfigLoader;
use k8slab::models::{AuthToken, CachedResource, CollectionKey};
use k8slab::services::LiveSession;
use k8slab::terminal::{TerminalMode, TerminalSession};
use k8slab::watcher::{diff_snapshots, display_name, get_all_commands};

/// k8slab - live cluster status and interactive terminals for k8s-lab
#[derive(Parser, Debug)]
#[command(name = "k8slab", version)]
#[command(about = "Live cluster status and interactive terminals for k8s-lab", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(long, short = 'd')]
    debug: bool,

    /// Bearer token for the API and the live channel
    #[arg(long, env = "K8SLAB_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Override the configured API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

/// Main commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Watch a collection live (default: clusters)
    Watch {
        /// Collection name or alias (clusters, teams, invitations)
        collection: Option<String>,
        /// Print changes as lines instead of running the TUI
        #[arg(long)]
        plain: bool,
    },
    /// Print a collection once
    List {
        /// Collection name or alias (clusters, teams, invitations)
        collection: Option<String>,
    },
    /// Open an interactive terminal on a RUNNING cluster
    Terminal {
        /// Cluster id or name
        cluster: String,
        /// Use a dedicated channel instead of the shared live channel
        #[arg(long, conflicts_with = "shared")]
        dedicated: bool,
        /// Use the shared live channel
        #[arg(long)]
        shared: bool,
    },
    /// Run a single command on a cluster without a live session
    Exec {
        /// Cluster id or name
        cluster: String,
        /// Command line to run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let command = match args.command {
        // Config commands need neither logging nor a session
        Some(Command::Config { subcommand }) => return handle_config_command(subcommand),
        Some(command) => command,
        None => Command::Watch {
            collection: None,
            plain: false,
        },
    };

    if let Some(path) = init_logging(args.debug) {
        eprintln!("Debug logging to {}", path.display());
    }

    let mut config = ConfigLoader::load().context("Failed to load configuration")?;
    if let Some(url) = args.api_url {
        config.api_url = url;
    }
    ConfigLoader::check(&config).context("Invalid configuration")?;
    tracing::debug!("Using API at {}", config.api_url);

    let token = args.token.and_then(AuthToken::new);
    let session = LiveSession::connect(&config, token)?;

    match command {
        Command::Watch { collection, plain } => {
            let collection = parse_collection(collection.as_deref())?;
            run_watch(session, collection, plain).await
        }
        Command::List { collection } => {
            let collection = parse_collection(collection.as_deref())?;
            session
                .seed(collection)
                .await
                .with_context(|| format!("Failed to fetch {}", collection))?;
            print_table(&session.snapshot(collection), session.config().ui.show_ids);
            Ok(())
        }
        Command::Terminal {
            cluster,
            dedicated,
            shared,
        } => {
            let mode = if dedicated {
                TerminalMode::Dedicated
            } else if shared {
                TerminalMode::Shared
            } else {
                session.config().terminal.mode
            };
            run_terminal(&session, &cluster, mode).await
        }
        Command::Exec { cluster, command } => run_exec(&session, &cluster, &command.join(" ")).await,
        Command::Config { .. } => Ok(()),
    }
}

fn parse_collection(name: Option<&str>) -> Result<CollectionKey> {
    let Some(name) = name else {
        return Ok(CollectionKey::Clusters);
    };
    CollectionKey::from_str_case_insensitive(name).ok_or_else(|| {
        let known = get_all_commands()
            .iter()
            .map(|(display, aliases)| format!("{} ({})", display, aliases.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::anyhow!("Unknown collection '{}'. Known collections: {}", name, known)
    })
}

fn print_table(resources: &[CachedResource], show_ids: bool) {
    if resources.is_empty() {
        println!("No resources found");
        return;
    }
    let width = resources
        .iter()
        .map(|r| r.name().len())
        .max()
        .unwrap_or(4)
        .max(4);
    if show_ids {
        println!("{:<width$}  {:<14}  ID", "NAME", "STATUS", width = width);
    } else {
        println!("{:<width$}  STATUS", "NAME", width = width);
    }
    for resource in resources {
        if show_ids {
            println!(
                "{:<width$}  {:<14}  {}",
                resource.name(),
                resource.status_label(),
                resource.id,
                width = width
            );
        } else {
            println!(
                "{:<width$}  {}",
                resource.name(),
                resource.status_label(),
                width = width
            );
        }
    }
}

#[cfg(feature = "tui")]
async fn run_watch(session: LiveSession, collection: CollectionKey, plain: bool) -> Result<()> {
    if plain {
        run_plain_watch(session, collection).await
    } else {
        k8slab::tui::run_tui(session, collection).await
    }
}

#[cfg(not(feature = "tui"))]
async fn run_watch(session: LiveSession, collection: CollectionKey, _plain: bool) -> Result<()> {
    run_plain_watch(session, collection).await
}

/// Line-oriented watch: print the seeded list, then one line per change
async fn run_plain_watch(session: LiveSession, collection: CollectionKey) -> Result<()> {
    session
        .seed(collection)
        .await
        .with_context(|| format!("Failed to fetch {}", collection))?;
    let mut before = session.snapshot(collection);
    println!("{} ({})", display_name(collection), before.len());
    print_table(&before, session.config().ui.show_ids);

    let _subscription = session.watch(collection);
    let mut changes = session.cache().changes();
    let mut ticker =
        tokio::time::interval(std::time::Duration::from_millis(session.config().ui.tick_ms.max(1)));
    let mut last_status = String::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                let after = session.snapshot(collection);
                let stamp = chrono::Local::now().format("%H:%M:%S");
                for change in diff_snapshots(&before, &after) {
                    println!("{} {}", stamp, change);
                }
                before = after;
            }
            _ = ticker.tick() => {
                let status = session.status_line();
                if status != last_status {
                    eprintln!("[{}]", status);
                    last_status = status;
                }
                if session.connection_status().is_some_and(|s| s.is_terminal()) {
                    return Err(anyhow::anyhow!("Live channel ended: {}", last_status));
                }
                if session.binder().is_rejected() || session.binder().token().is_none() {
                    return Err(anyhow::anyhow!("{}", last_status));
                }
            }
        }
    }
    Ok(())
}

/// Resolve a cluster by id or name from a fresh cluster list
async fn resolve_cluster(session: &LiveSession, cluster: &str) -> Result<CachedResource> {
    session
        .seed(CollectionKey::Clusters)
        .await
        .context("Failed to fetch clusters")?;
    session
        .resolve_cluster(cluster)
        .ok_or_else(|| anyhow::anyhow!("Unknown cluster '{}'", cluster))
}

async fn run_terminal(session: &LiveSession, cluster: &str, mode: TerminalMode) -> Result<()> {
    let target = resolve_cluster(session, cluster).await?;
    // The server only serves terminals for running clusters
    if !target.status.as_ref().is_some_and(|s| s.is_running()) {
        return Err(anyhow::anyhow!(
            "Cluster '{}' is {}; terminals are only available for RUNNING clusters",
            target.name(),
            target.status_label()
        ));
    }

    tracing::info!("Opening {} terminal on cluster {}", mode, target.id);
    let mut terminal = session
        .start_terminal(&target.id, mode)
        .context("Failed to start terminal session")?;

    attach(&mut terminal, target.name()).await?;
    terminal.close();
    Ok(())
}

#[cfg(feature = "tui")]
async fn attach(terminal: &mut TerminalSession, label: &str) -> Result<()> {
    k8slab::tui::interactive::attach(terminal, label).await?;
    Ok(())
}

/// Line-buffered terminal for builds without raw-mode support
#[cfg(not(feature = "tui"))]
async fn attach(terminal: &mut TerminalSession, _label: &str) -> Result<()> {
    use k8slab::terminal::SessionOutput;
    use std::io::Write;
    use tokio::io::AsyncBufReadExt;

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Err(e) = terminal.send_input(format!("{}\n", line)) {
                        eprintln!("[k8slab: {}]", e);
                    }
                }
                None => break,
            },
            item = terminal.recv() => match item {
                Some(SessionOutput::Data(data)) => {
                    print!("{}", data);
                    std::io::stdout().flush()?;
                }
                Some(SessionOutput::Error(message)) => eprintln!("[k8slab: {}]", message),
                Some(SessionOutput::Closed(reason)) => {
                    eprintln!("[k8slab: {}]", reason);
                    break;
                }
                None => break,
            }
        }
    }
    Ok(())
}

async fn run_exec(session: &LiveSession, cluster: &str, command: &str) -> Result<()> {
    // Names need the cluster list; fall back to treating the argument as an id
    let cluster_id = match resolve_cluster(session, cluster).await {
        Ok(target) => target.id,
        Err(e) => {
            tracing::debug!("Using '{}' as a cluster id: {:#}", cluster, e);
            cluster.to_string()
        }
    };

    let output = session
        .exec(&cluster_id, command)
        .await
        .with_context(|| format!("Failed to run command on cluster {}", cluster))?;

    let rendered = output
        .into_result()
        .with_context(|| format!("Command failed on cluster {}", cluster))?;
    print!("{}", rendered);
    Ok(())
}
