//! Periodic pull of authoritative state.

use crate::SyncError;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tea_client::GameApi;
use tea_core::{validate_game, GameId, GameSession, Player, PlayerId};
use tracing::{debug, warn};

/// One successful poll. All three reads succeeded or there is no snapshot.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerSnapshot {
    pub game: GameSession,
    pub players: Vec<Player>,
    pub me: Player,
}

pub struct Poller<A> {
    api: Arc<A>,
    game_id: GameId,
    player_id: PlayerId,
}

impl<A: GameApi> Poller<A> {
    pub fn new(api: Arc<A>, game_id: GameId, player_id: PlayerId) -> Self {
        Self {
            api,
            game_id,
            player_id,
        }
    }

    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    /// Fetch game, roster and own player concurrently. A game reporting an
    /// impossible round fails the poll like a network error.
    pub async fn fetch(&self) -> Result<ServerSnapshot, SyncError> {
        let (game, players, me) = tokio::try_join!(
            self.api.get_game(self.game_id),
            self.api.get_players(self.game_id),
            self.api.get_player(self.player_id),
        )?;
        validate_game(&game)?;
        debug!(
            game_id = self.game_id,
            round = game.current_round,
            status = ?game.status,
            players = players.len(),
            "poll ok"
        );
        Ok(ServerSnapshot { game, players, me })
    }
}

/// Drive `fut` to completion, calling `on_expire` once if it is still running
/// after `timeout`. The future itself is never cancelled.
pub async fn race_watchdog<F, E>(fut: F, timeout: Duration, on_expire: E) -> F::Output
where
    F: Future,
    E: FnOnce(),
{
    tokio::pin!(fut);
    let expiry = tokio::time::sleep(timeout);
    tokio::pin!(expiry);
    let mut on_expire = Some(on_expire);
    loop {
        tokio::select! {
            out = &mut fut => return out,
            _ = &mut expiry, if on_expire.is_some() => {
                warn!(timeout_ms = timeout.as_millis() as u64, "request still pending, clearing loading state");
                if let Some(f) = on_expire.take() {
                    f();
                }
            }
        }
    }
}
