//! Runs CLI commands against the archive, syncing with the current room.
//!
//! When the share link names a room and a remote store is configured, a
//! short-lived sync session is started: the room is fetched before the
//! command runs and any change it makes is pushed before the process exits.
//! Remote failures never fail the command; the change stays in the local
//! store as a pending write and is pushed once a later run reaches the room.

use std::error::Error;
use std::sync::Arc;

use heritage_archive_core::{
    load_or_seed, ArchiveHolder, ArchiveState, FileStore, LocalStore, PendingWrite, RemoteStore,
    SessionHandle, SessionStatus, ShareLink, SyncError, SyncSession, SyncStatus,
};

use crate::config::Config;

pub fn local_store(config: &Config) -> Arc<FileStore> {
    Arc::new(FileStore::new(config.data_dir.value.clone()))
}

/// Starts a sync session for `link`. Must be called inside a tokio runtime.
pub fn start_session(
    config: &Config,
    link: &ShareLink,
) -> Result<(ArchiveHolder, SessionHandle), SyncError> {
    let remote = config.sync.remote()?.ok_or(SyncError::NotConfigured)?;
    let holder = ArchiveHolder::new(ArchiveState::default());
    let handle = SyncSession::start(
        holder.clone(),
        local_store(config) as Arc<dyn LocalStore>,
        Arc::new(remote) as Arc<dyn RemoteStore>,
        link.clone(),
        config.sync.session_config(),
    );
    Ok((holder, handle))
}

/// Runs `command` with the current archive and keeps the room in sync
/// around it.
pub fn with_archive<T, F>(config: &Config, link: &ShareLink, command: F) -> Result<T, Box<dyn Error>>
where
    F: FnOnce(&ArchiveHolder) -> Result<T, Box<dyn Error>>,
{
    if link.room().is_none() {
        return with_local_archive(config, link, command);
    }
    if !config.sync.is_configured() {
        eprintln!("Sync: not configured, working offline");
        return with_local_archive(config, link, command);
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let (holder, handle) = start_session(config, link)?;
        tracing::info!("Syncing with {}", link);

        report(&handle.flush().await?);
        let result = command(&holder);
        if result.is_ok() {
            report(&handle.flush().await?);
        }
        handle.shutdown().await;
        result
    })
}

/// Runs `command` against the local store only. Changes made while a room
/// is set are also kept as its pending write.
fn with_local_archive<T, F>(
    config: &Config,
    link: &ShareLink,
    command: F,
) -> Result<T, Box<dyn Error>>
where
    F: FnOnce(&ArchiveHolder) -> Result<T, Box<dyn Error>>,
{
    let store = local_store(config);
    let before = load_or_seed(&*store);
    let holder = ArchiveHolder::new(before.clone());

    let result = command(&holder)?;

    let after = holder.current();
    if after != before {
        store.save(&after)?;
        tracing::debug!("Saved archive to {}", store.path().display());

        if let Some(room) = link.room() {
            store.save_pending(&PendingWrite { room, state: after })?;
        }
    }
    Ok(result)
}

fn report(status: &SessionStatus) {
    if status.status == SyncStatus::Error {
        let reason = status.last_error.as_deref().unwrap_or("unknown error");
        eprintln!(
            "Sync: {} (changes are kept locally and pushed on the next successful sync)",
            reason
        );
    }
}

/// Unwraps the error a session reported, for commands that must fail when
/// the remote is unreachable.
pub fn require_synced(status: &SessionStatus) -> Result<(), SyncError> {
    match status.status {
        SyncStatus::Error => Err(heritage_archive_core::RemoteError::RemoteUnavailable(
            status
                .last_error
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        )
        .into()),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigSource, ConfigValue, SyncConfig};
    use heritage_archive_core::PractitionerRecord;
    use tempfile::TempDir;

    fn test_config() -> (Config, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: ConfigValue::new(temp_dir.path().to_path_buf(), ConfigSource::Default),
            config_file: None,
            sync: SyncConfig::default(),
        };
        (config, temp_dir)
    }

    fn base() -> ShareLink {
        ShareLink::parse("http://localhost:5173/kuaishou_feiyia/").unwrap()
    }

    #[test]
    fn test_local_edit_is_saved() {
        let (config, _temp) = test_config();

        with_archive(&config, &base(), |holder| {
            holder.update(|s| s.with_practitioner(PractitionerRecord::new("Li")));
            Ok(())
        })
        .unwrap();

        let store = local_store(&config);
        assert!(store.load().unwrap().unwrap().find("Li").is_some());
        // no room, nothing to push later
        assert!(store.load_pending().unwrap().is_none());
    }

    #[test]
    fn test_read_does_not_write() {
        let (config, _temp) = test_config();

        let count = with_archive(&config, &base(), |holder| {
            Ok(holder.current().practitioners.len())
        })
        .unwrap();

        assert_eq!(count, 1);
        assert!(!local_store(&config).exists());
    }

    #[test]
    fn test_failed_command_does_not_save() {
        let (config, _temp) = test_config();

        let result: Result<(), _> = with_archive(&config, &base(), |holder| {
            holder.update(|s| s.with_practitioner(PractitionerRecord::new("Li")));
            Err("boom".into())
        });

        assert!(result.is_err());
        assert!(!local_store(&config).exists());
    }

    #[test]
    fn test_room_without_server_works_offline() {
        let (config, _temp) = test_config();
        let link = base().with_room(&heritage_archive_core::RoomId::new("r1").unwrap());

        with_archive(&config, &link, |holder| {
            holder.update(|s| s.with_practitioner(PractitionerRecord::new("Li")));
            Ok(())
        })
        .unwrap();

        let store = local_store(&config);
        assert!(store.exists());
        let pending = store.load_pending().unwrap().unwrap();
        assert_eq!(pending.room.as_str(), "r1");
        assert!(pending.state.find("Li").is_some());
    }

    #[test]
    fn test_require_synced() {
        let mut status = SessionStatus {
            status: SyncStatus::Synced,
            room_id: None,
            share_link: base().to_string(),
            last_sync_time: None,
            last_error: None,
            snapshot_fingerprint: None,
        };
        assert!(require_synced(&status).is_ok());

        status.status = SyncStatus::Error;
        status.last_error = Some("Room not found on remote store: r1".to_string());
        let err = require_synced(&status).unwrap_err();
        assert!(err.to_string().contains("Room not found"));
    }
}
