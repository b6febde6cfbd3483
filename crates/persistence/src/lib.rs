#![deny(warnings)]

//! Persistence layer: the player's session, kept as a small JSON file so a
//! restarted client can resume the game it was in.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tea_core::{GameId, PlayerId};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors writing the session file.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("session encode: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What the client remembers about who it is and which game it is in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    #[serde(default)]
    pub game_id: Option<GameId>,
}

impl SessionState {
    /// `(game_id, player_id)` when the player is seated in a game.
    pub fn game_context(&self) -> Option<(GameId, PlayerId)> {
        Some((self.game_id?, self.player_id?))
    }
}

/// Write-through store for [`SessionState`].
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    state: SessionState,
    hydrated: bool,
}

impl SessionStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: SessionState::default(),
            hydrated: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// Load the saved session once. A missing or unreadable file leaves an
    /// empty session.
    pub fn hydrate(&mut self) -> &SessionState {
        if self.hydrated {
            return &self.state;
        }
        self.hydrated = true;
        match fs::read_to_string(&self.path) {
            Ok(text) => match serde_json::from_str::<SessionState>(&text) {
                Ok(state) => {
                    debug!(path = %self.path.display(), "session hydrated");
                    self.state = state;
                }
                Err(e) => warn!(path = %self.path.display(), error = %e, "failed to hydrate session"),
            },
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to read session"),
        }
        &self.state
    }

    /// Start a fresh session; any previous game context is dropped.
    pub fn set_session(&mut self, token: &str, nickname: &str) -> Result<(), SessionError> {
        self.state = SessionState {
            session_token: Some(token.to_string()),
            nickname: nickname.to_string(),
            player_id: None,
            game_id: None,
        };
        self.hydrated = true;
        self.write()
    }

    pub fn set_player_context(&mut self, player_id: PlayerId, game_id: GameId) -> Result<(), SessionError> {
        self.state.player_id = Some(player_id);
        self.state.game_id = Some(game_id);
        self.write()
    }

    /// Forget everything and delete the file.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        self.state = SessionState::default();
        self.hydrated = true;
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        info!(path = %self.path.display(), "session cleared");
        Ok(())
    }

    fn write(&self) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.state)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, text)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
