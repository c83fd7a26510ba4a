//! Sync CLI commands for sharing the archive through a remote room.

use clap::{Args, Subcommand};

use heritage_archive_core::room::RoomError;
use heritage_archive_core::{LocalStore, RemoteError, SessionStatus, ShareLink, SyncError};

use super::practitioner::confirm;
use super::OutputFormat;
use crate::config::Config;
use crate::sync::{local_store, require_synced, start_session, LinkError, LinkFile};

/// Share the archive through a remote room
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: SyncSubcommand,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and room status
    Status {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create a room from the local archive and print its share link
    Create,

    /// Join an existing room, replacing the local archive with its contents
    Join {
        /// Share link or bare room id
        link: String,
    },

    /// Leave the current room; the archive stays on this device
    Disconnect {
        /// Skip confirmation prompt
        #[arg(long, short)]
        force: bool,
    },

    /// Keep syncing until interrupted, printing status changes
    Watch,
}

impl SyncCommand {
    pub fn run(
        &self,
        config: &Config,
        link: &ShareLink,
        link_file: &LinkFile,
    ) -> Result<(), SyncCommandError> {
        // Use tokio runtime for async operations
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?;

        match &self.command {
            SyncSubcommand::Status { format } => rt.block_on(self.status(config, link, format)),
            SyncSubcommand::Create => rt.block_on(self.create(config, link, link_file)),
            SyncSubcommand::Join { link: input } => {
                let target = ShareLink::from_input(input, &config.sync.share_base()?)?;
                rt.block_on(self.join(config, &target, link_file))
            }
            SyncSubcommand::Disconnect { force } => {
                self.disconnect(config, link, link_file, *force)
            }
            SyncSubcommand::Watch => rt.block_on(self.watch(config, link)),
        }
    }

    async fn status(
        &self,
        config: &Config,
        link: &ShareLink,
        format: &OutputFormat,
    ) -> Result<(), SyncCommandError> {
        if !config.sync.is_configured() {
            println!("Status: Not configured");
            println!();
            println!("To enable sync, add to your config file:");
            println!();
            println!("  sync:");
            println!("    server_url: \"http://localhost:8787/rooms\"");
            println!();
            println!("Or set environment variable:");
            println!("  ARCHIVE_SYNC_URL");
            return Ok(());
        }

        let (_holder, handle) = start_session(config, link)?;
        let status = if link.room().is_some() {
            handle.flush().await
        } else {
            Ok(handle.status())
        };
        handle.shutdown().await;
        let status = status?;

        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&status)
                    .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Text => {
                println!("Server: {}", config.sync.server_url.as_deref().unwrap_or_default());
                println!("{}", status);
            }
        }
        Ok(())
    }

    async fn create(
        &self,
        config: &Config,
        link: &ShareLink,
        link_file: &LinkFile,
    ) -> Result<(), SyncCommandError> {
        if let Some(room) = link.room() {
            return Err(SyncCommandError::AlreadyInRoom(room.to_string()));
        }

        let (holder, handle) = start_session(config, link)?;
        let result = handle.create_room().await;
        handle.shutdown().await;
        let shared = result?;

        link_file.save(&shared)?;

        println!(
            "Created room with {} practitioner(s).",
            holder.current().practitioners.len()
        );
        println!();
        println!("Share this link: {}", shared);
        Ok(())
    }

    async fn join(
        &self,
        config: &Config,
        target: &ShareLink,
        link_file: &LinkFile,
    ) -> Result<(), SyncCommandError> {
        let (holder, handle) = start_session(config, target)?;
        let status = handle.flush().await;
        handle.shutdown().await;
        require_synced(&status?)?;

        link_file.save(target)?;

        let room = target.room().map(|r| r.to_string()).unwrap_or_default();
        println!(
            "Joined room {} ({} practitioner(s)).",
            room,
            holder.current().practitioners.len()
        );
        Ok(())
    }

    fn disconnect(
        &self,
        config: &Config,
        link: &ShareLink,
        link_file: &LinkFile,
        force: bool,
    ) -> Result<(), SyncCommandError> {
        let Some(room) = link.room() else {
            println!("Not in a room.");
            return Ok(());
        };

        let store = local_store(config);
        let unsent = store
            .load_pending()
            .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?
            .filter(|pending| pending.room == room);
        if unsent.is_some() {
            println!("Changes not yet pushed to room {} will stay on this device only.", room);
        }

        // Confirm leaving unless --force is used
        if !force
            && !confirm("Leaving the room stops saving changes to it. Continue?")
                .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?
        {
            println!("Cancelled.");
            return Ok(());
        }

        link_file.save(&link.without_room())?;
        if unsent.is_some() {
            store
                .clear_pending()
                .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?;
        }
        println!("Left room {}. The archive stays on this device.", room);
        Ok(())
    }

    async fn watch(&self, config: &Config, link: &ShareLink) -> Result<(), SyncCommandError> {
        let Some(room) = link.room() else {
            return Err(SyncCommandError::NoRoom);
        };

        let (holder, handle) = start_session(config, link)?;
        let mut statuses = handle.subscribe();
        let mut archive = holder.subscribe();

        println!("Watching room {} (Ctrl-C to stop)", room);
        print_status(&statuses.borrow_and_update());

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);

        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                changed = statuses.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_status(&statuses.borrow_and_update());
                }
                changed = archive.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let count = archive.borrow_and_update().practitioners.len();
                    println!("[{}] archive: {} practitioner(s)", timestamp(), count);
                }
            }
        }

        handle.shutdown().await;
        println!("Stopped.");
        Ok(())
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn print_status(status: &SessionStatus) {
    match &status.last_error {
        Some(error) => println!("[{}] {}: {}", timestamp(), status.status, error),
        None => println!("[{}] {}", timestamp(), status.status),
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    SyncError(SyncError),
    LinkError(LinkError),
    RuntimeError(String),
    AlreadyInRoom(String),
    NoRoom,
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::SyncError(e) => write!(f, "{}", e),
            SyncCommandError::LinkError(e) => write!(f, "{}", e),
            SyncCommandError::RuntimeError(e) => write!(f, "Runtime error: {}", e),
            SyncCommandError::AlreadyInRoom(room) => write!(
                f,
                "Already in room {}. Run 'archive sync disconnect' first.",
                room
            ),
            SyncCommandError::NoRoom => write!(
                f,
                "Not in a room. Use 'archive sync create' or 'archive sync join <link>'."
            ),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::SyncError(e) => Some(e),
            SyncCommandError::LinkError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::SyncError(e)
    }
}

impl From<RemoteError> for SyncCommandError {
    fn from(e: RemoteError) -> Self {
        SyncCommandError::SyncError(e.into())
    }
}

impl From<LinkError> for SyncCommandError {
    fn from(e: LinkError) -> Self {
        SyncCommandError::LinkError(e)
    }
}

impl From<RoomError> for SyncCommandError {
    fn from(e: RoomError) -> Self {
        SyncCommandError::LinkError(LinkError::InvalidLink(e))
    }
}
