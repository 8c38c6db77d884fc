//! back up every store under a stores directory to S3: fetch (or clone) each
//! into a scratch location, tar it, and upload the tarball via `aws-sdk-s3`.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use aws_sdk_s3::primitives::ByteStream;
use clap::Parser;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "herodb-s3-backup")]
#[command(about = "back up herodb stores to an S3 bucket")]
struct Cli {
    /// directory containing one subdirectory per store
    stores_root: PathBuf,

    /// scratch directory to clone/fetch bare repos into before archiving
    backup_dir: PathBuf,

    /// destination S3 bucket
    #[arg(long)]
    bucket: String,
}

fn refresh_bare_clone(stores_root: &Path, backup_dir: &Path, store_id: &str) -> std::io::Result<()> {
    let source = stores_root.join(format!("{store_id}.git"));
    let dest = backup_dir.join(format!("{store_id}.git"));

    if dest.is_dir() {
        Command::new("git").args(["fetch", "origin"]).current_dir(&dest).status()?;
    } else {
        Command::new("git")
            .args(["clone", "--bare"])
            .arg(&source)
            .arg(&dest)
            .status()?;
    }
    Ok(())
}

fn make_tarball(backup_dir: &Path, store_id: &str) -> std::io::Result<PathBuf> {
    let tarball = backup_dir.join(format!("{store_id}.tgz"));
    let status = Command::new("tar")
        .arg("-czf")
        .arg(&tarball)
        .arg(format!("{store_id}.git"))
        .current_dir(backup_dir)
        .status()?;
    if !status.success() {
        return Err(std::io::Error::other(format!("tar exited with {status}")));
    }
    Ok(tarball)
}

async fn upload(client: &aws_sdk_s3::Client, bucket: &str, tarball: &Path, store_id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let body = ByteStream::from_path(tarball).await?;
    client
        .put_object()
        .bucket(bucket)
        .key(format!("{store_id}.tgz"))
        .body(body)
        .send()
        .await?;
    Ok(())
}

async fn run(cli: Cli) -> Result<bool, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&cli.backup_dir)?;

    let sdk_config = aws_config::load_from_env().await;
    let client = aws_sdk_s3::Client::new(&sdk_config);

    let mut ok = true;
    for entry in std::fs::read_dir(&cli.stores_root)? {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().and_then(|n| n.strip_suffix(".git").map(str::to_string)) else {
            continue;
        };

        info!(store = %name, "refreshing bare clone");
        if let Err(e) = refresh_bare_clone(&cli.stores_root, &cli.backup_dir, &name) {
            error!(store = %name, error = %e, "clone/fetch failed");
            ok = false;
            continue;
        }

        let tarball = match make_tarball(&cli.backup_dir, &name) {
            Ok(path) => path,
            Err(e) => {
                error!(store = %name, error = %e, "tar failed");
                ok = false;
                continue;
            }
        };

        info!(store = %name, bucket = %cli.bucket, "uploading");
        if let Err(e) = upload(&client, &cli.bucket, &tarball, &name).await {
            error!(store = %name, error = %e, "upload failed");
            ok = false;
        }

        let _ = std::fs::remove_file(&tarball);
    }
    Ok(ok)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error building tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
