use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod media;
mod sync;

use commands::{ConfigCommand, PractitionerCommand, SiteCommand, SyncCommand, WorkCommand};
use config::Config;
use heritage_archive_core::ShareLink;
use sync::LinkFile;

#[derive(Parser)]
#[command(name = "archive")]
#[command(version)]
#[command(
    about = "Maintain and share an archive of intangible cultural heritage practitioners",
    long_about = None
)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Share link or room id to use instead of the saved one
    #[arg(long, global = true)]
    link: Option<String>,

    /// Log sync activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage practitioners
    Practitioner(PractitionerCommand),

    /// Manage a practitioner's representative works
    Work(WorkCommand),

    /// Manage site header and footer settings
    Site(SiteCommand),

    /// Manage configuration
    Config(ConfigCommand),

    /// Share the archive through a remote room
    Sync(SyncCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Save config path for init command
    let cli_config_path = cli.config.clone();

    // Load configuration
    let config = Config::load(cli.config)?;
    let link_file = LinkFile::new(config.data_dir.value.clone());
    let explicit_link = cli
        .link
        .clone()
        .or_else(|| std::env::var("ARCHIVE_LINK").ok());

    let current_link = || -> Result<ShareLink, Box<dyn std::error::Error>> {
        let base = config.sync.share_base()?;
        Ok(link_file.resolve(explicit_link.as_deref(), &base)?)
    };

    match &cli.command {
        Some(Commands::Practitioner(cmd)) => cmd.run(&config, &current_link()?)?,
        Some(Commands::Work(cmd)) => cmd.run(&config, &current_link()?)?,
        Some(Commands::Site(cmd)) => cmd.run(&config, &current_link()?)?,
        Some(Commands::Config(cmd)) => cmd.run(&config, cli_config_path)?,
        Some(Commands::Sync(cmd)) => cmd.run(&config, &current_link()?, &link_file)?,
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "heritage_archive=info,heritage_archive_core=info"
    } else {
        "heritage_archive=warn,heritage_archive_core=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
