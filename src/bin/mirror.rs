//! mirror every store under a stores directory to a local or remote path via
//! `git clone --bare`/`git fetch`, one subprocess call per store.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "herodb-mirror")]
#[command(about = "mirror herodb stores from a remote source into a local stores directory")]
struct Cli {
    /// source: a local path, or `host:path` for a remote one over ssh
    source: String,

    /// local directory to mirror stores into, one subdirectory per store
    stores_root: PathBuf,

    /// mirror only these store ids (defaults to every store found at `source`)
    #[arg(long)]
    store: Vec<String>,
}

struct Remote {
    host: Option<String>,
    path: String,
}

fn parse_destination(dest: &str) -> Remote {
    match dest.split_once(':') {
        Some((host, path)) if !host.contains('/') => Remote {
            host: Some(host.to_string()),
            path: path.to_string(),
        },
        _ => Remote {
            host: None,
            path: dest.to_string(),
        },
    }
}

fn list_remote_repos(remote: &Remote) -> Vec<String> {
    let output = match &remote.host {
        Some(host) => Command::new("ssh").arg(host).arg(format!("ls {}", remote.path)).output(),
        None => Command::new("ls").arg(&remote.path).output(),
    };
    match output {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(|l| l.trim_end_matches(".git").to_string())
            .collect(),
        _ => Vec::new(),
    }
}

fn mirror_store(stores_root: &Path, remote: &Remote, store_id: &str) -> std::io::Result<()> {
    let local_path = stores_root.join(format!("{store_id}.git"));
    let remote_spec = match &remote.host {
        Some(host) => format!("{host}:{}/{store_id}.git", remote.path),
        None => format!("{}/{store_id}.git", remote.path),
    };

    if local_path.is_dir() {
        info!(store = store_id, "fetching");
        Command::new("git")
            .args(["fetch", "origin"])
            .current_dir(&local_path)
            .status()?;
    } else {
        info!(store = store_id, "cloning");
        Command::new("git")
            .args(["clone", "--bare", &remote_spec])
            .arg(&local_path)
            .status()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if let Err(e) = std::fs::create_dir_all(&cli.stores_root) {
        error!(error = %e, "could not create stores root");
        return ExitCode::FAILURE;
    }

    let remote = parse_destination(&cli.source);
    let existing = list_remote_repos(&remote);

    let stores = if cli.store.is_empty() {
        existing.clone()
    } else {
        cli.store
    };

    let mut failures = 0;
    for store_id in &stores {
        if let Err(e) = mirror_store(&cli.stores_root, &remote, store_id) {
            error!(store = %store_id, error = %e, "mirror failed");
            failures += 1;
        }
    }

    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
