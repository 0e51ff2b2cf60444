//! publish-to-git CLI
//!
//! Packs a package directory and publishes the result into a git repository.

use clap::Parser;
use publish_to_git::{Options, Outcome, Publisher};
use std::path::PathBuf;
use std::process;

/// Publish a built package into a separate git repository
#[derive(Parser)]
#[command(name = "publish-to-git")]
#[command(version)]
#[command(about = "Pack a package directory and push it into a git repository", long_about = None)]
struct Cli {
    /// Source package directory (must contain package.json)
    #[arg(value_name = "PACKAGE_DIR")]
    package_dir: PathBuf,

    /// Target repository URL or path
    #[arg(value_name = "GIT_REMOTE")]
    remote: String,

    /// Override the commit message
    #[arg(long)]
    commit_text: Option<String>,

    /// Override the tag name (default: v<version>)
    #[arg(long)]
    tag_name: Option<String>,

    /// Override the annotated-tag message (default: the commit message)
    #[arg(long)]
    tag_message: Option<String>,

    /// Branch to force-move to the new tag; repeatable
    #[arg(long = "branch", value_name = "BRANCH")]
    branches: Vec<String>,

    /// Override the scratch directory location
    #[arg(long)]
    temp_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let options = Options {
        commit_text: cli.commit_text,
        tag_name: cli.tag_name,
        tag_message_text: cli.tag_message,
        extra_branch_names: cli.branches,
        temp_dir: cli.temp_dir,
        ..Default::default()
    };

    match Publisher::new()
        .publish(&cli.package_dir, &cli.remote, options)
        .await
    {
        Ok(Outcome::Pushed) => {
            println!("pushed");
        }
        Ok(Outcome::Skipped) => {
            println!("skipped: no changes against the target repository");
        }
        Ok(Outcome::Cancelled) => {
            println!("cancelled");
            process::exit(2);
        }
        Err(e) => {
            // anyhow's alternate formatting prints the full source chain
            eprintln!("error: {:#}", anyhow::Error::new(e));
            process::exit(1);
        }
    }
}
