//! Persistence of the current share link.
//!
//! The link is the only record of which room this device belongs to. It
//! lives next to the archive:
//! ```text
//! ~/.local/share/heritage-archive/
//! ├── ich_archive_v4.json
//! └── share_link              # text file with the current link
//! ```

use std::fs;
use std::io;
use std::path::PathBuf;

use heritage_archive_core::room::{RoomError, ShareLink};

const SHARE_LINK_FILE: &str = "share_link";

#[derive(Clone, Debug)]
pub struct LinkFile {
    data_dir: PathBuf,
}

impl LinkFile {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn path(&self) -> PathBuf {
        self.data_dir.join(SHARE_LINK_FILE)
    }

    pub fn save(&self, link: &ShareLink) -> Result<(), LinkError> {
        fs::create_dir_all(&self.data_dir)
            .map_err(|e| LinkError::IoError(self.data_dir.clone(), e))?;

        let path = self.path();
        fs::write(&path, link.as_str()).map_err(|e| LinkError::IoError(path, e))
    }

    /// Returns `Ok(None)` if no link has been saved.
    pub fn load(&self) -> Result<Option<ShareLink>, LinkError> {
        let path = self.path();

        match fs::read_to_string(&path) {
            Ok(content) => ShareLink::parse(content.trim())
                .map(Some)
                .map_err(LinkError::InvalidLink),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LinkError::IoError(path, e)),
        }
    }

    /// The link to use: an explicit override (link or bare room id), else the
    /// saved link, else `base` with no room.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        base: &ShareLink,
    ) -> Result<ShareLink, LinkError> {
        if let Some(input) = explicit {
            return ShareLink::from_input(input, base).map_err(LinkError::InvalidLink);
        }
        Ok(self.load()?.unwrap_or_else(|| base.clone()))
    }
}

#[derive(Debug)]
pub enum LinkError {
    IoError(PathBuf, io::Error),
    InvalidLink(RoomError),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkError::IoError(path, e) => write!(f, "I/O error for {}: {}", path.display(), e),
            LinkError::InvalidLink(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::IoError(_, e) => Some(e),
            LinkError::InvalidLink(e) => Some(e),
        }
    }
}
