use indexmap::IndexMap;
use thiserror::Error;
use uuid::Uuid;

use crate::dao::models::{GameEntity, StatLineEntity};

/// Maximum number of players tracked on court at the same time.
pub const MAX_ACTIVE_PLAYERS: usize = 5;

/// Counters that can be adjusted from the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    /// Points scored.
    Points,
    /// Rebounds grabbed.
    Rebounds,
    /// Assists made.
    Assists,
}

/// Live counters of one player.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatLine {
    /// Points scored.
    pub points: u32,
    /// Rebounds grabbed.
    pub rebounds: u32,
    /// Assists made.
    pub assists: u32,
    /// Seconds spent on court.
    pub seconds_played: u32,
}

impl StatLine {
    /// Read the counter matching `kind`.
    pub fn get(&self, kind: StatKind) -> u32 {
        match kind {
            StatKind::Points => self.points,
            StatKind::Rebounds => self.rebounds,
            StatKind::Assists => self.assists,
        }
    }

    fn get_mut(&mut self, kind: StatKind) -> &mut u32 {
        match kind {
            StatKind::Points => &mut self.points,
            StatKind::Rebounds => &mut self.rebounds,
            StatKind::Assists => &mut self.assists,
        }
    }
}

impl From<&StatLineEntity> for StatLine {
    fn from(value: &StatLineEntity) -> Self {
        Self {
            points: value.points,
            rebounds: value.rebounds,
            assists: value.assists,
            seconds_played: value.seconds_played,
        }
    }
}

/// Game the session is tracking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentGame {
    /// Identifier of the persisted game.
    pub id: Uuid,
    /// Team playing the game.
    pub team_id: Uuid,
    /// Name of the opposing team.
    pub opponent: String,
    /// Configured duration in minutes.
    pub duration_minutes: u32,
}

impl CurrentGame {
    /// Configured duration in seconds.
    pub fn duration_secs(&self) -> u32 {
        self.duration_minutes.saturating_mul(60)
    }
}

impl From<&GameEntity> for CurrentGame {
    fn from(value: &GameEntity) -> Self {
        Self {
            id: value.id,
            team_id: value.team_id,
            opponent: value.opponent.clone(),
            duration_minutes: value.duration_minutes,
        }
    }
}

/// Game clock: a running flag, the elapsed time and the countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameClock {
    /// Whether ticks currently advance time.
    pub running: bool,
    /// Seconds elapsed while running.
    pub elapsed_secs: u32,
    /// Seconds left before the end of the game.
    pub time_left_secs: u32,
}

/// A rostered player currently on court.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivePlayerEntry {
    /// Roster identifier of the player.
    pub player_id: Uuid,
    /// Display name, copied from the roster when the player was added.
    pub name: String,
    /// Live counters.
    pub stats: StatLine,
    /// Set while the counters are being persisted; the entry is frozen meanwhile.
    pub flushing: bool,
}

/// Result of a single clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The clock was paused; nothing changed.
    Idle,
    /// One second elapsed.
    Advanced,
    /// One second elapsed and the clock ran out; it is now stopped.
    Expired,
}

/// Rejections of session commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The on-court limit is reached.
    #[error("the active roster is full ({limit} players)")]
    RosterFull {
        /// Maximum number of on-court players.
        limit: usize,
    },
    /// The player already has an on-court entry.
    #[error("player `{0}` is already on court")]
    AlreadyActive(Uuid),
    /// The player has no on-court entry.
    #[error("player `{0}` is not on court")]
    NotActive(Uuid),
    /// The player's counters are being saved.
    #[error("stats of player `{0}` are being saved")]
    FlushInProgress(Uuid),
    /// The clock has no time left.
    #[error("the game clock has run out")]
    ClockExpired,
}

/// Read-only projection of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Tracked game.
    pub game: CurrentGame,
    /// Clock state.
    pub clock: GameClock,
    /// On-court entries in the order they were added.
    pub players: Vec<ActivePlayerEntry>,
}

/// Live scoreboard of the game in progress.
#[derive(Debug, Clone)]
pub struct GameSession {
    game: CurrentGame,
    clock: GameClock,
    active: IndexMap<Uuid, ActivePlayerEntry>,
}

impl GameSession {
    /// Create a paused session with the full game duration left.
    pub fn new(game: CurrentGame) -> Self {
        let clock = GameClock {
            running: false,
            elapsed_secs: 0,
            time_left_secs: game.duration_secs(),
        };
        Self {
            game,
            clock,
            active: IndexMap::new(),
        }
    }

    /// Tracked game.
    pub fn game(&self) -> &CurrentGame {
        &self.game
    }

    /// Current clock state.
    pub fn clock(&self) -> GameClock {
        self.clock
    }

    /// Entry of an on-court player.
    pub fn entry(&self, player_id: Uuid) -> Option<&ActivePlayerEntry> {
        self.active.get(&player_id)
    }

    /// Whether the player is on court.
    pub fn is_active(&self, player_id: Uuid) -> bool {
        self.active.contains_key(&player_id)
    }

    /// Number of on-court entries.
    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Start the clock. Fails when no time is left.
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.clock.time_left_secs == 0 {
            return Err(SessionError::ClockExpired);
        }
        self.clock.running = true;
        Ok(())
    }

    /// Stop the clock.
    pub fn pause(&mut self) {
        self.clock.running = false;
    }

    /// Flip the running flag and return the new value.
    pub fn toggle(&mut self) -> Result<bool, SessionError> {
        if self.clock.running {
            self.pause();
        } else {
            self.start()?;
        }
        Ok(self.clock.running)
    }

    /// Advance the clock by one second when running.
    ///
    /// Frozen entries do not accumulate time, so what gets persisted for them is exactly what
    /// they held when the flush began.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.clock.running {
            return TickOutcome::Idle;
        }

        self.clock.elapsed_secs = self.clock.elapsed_secs.saturating_add(1);
        self.clock.time_left_secs = self.clock.time_left_secs.saturating_sub(1);
        for entry in self.active.values_mut().filter(|entry| !entry.flushing) {
            entry.stats.seconds_played = entry.stats.seconds_played.saturating_add(1);
        }

        if self.clock.time_left_secs == 0 {
            self.clock.running = false;
            TickOutcome::Expired
        } else {
            TickOutcome::Advanced
        }
    }

    /// Check that `player_id` could be added right now.
    pub fn ensure_can_add(&self, player_id: Uuid) -> Result<(), SessionError> {
        if self.active.contains_key(&player_id) {
            return Err(SessionError::AlreadyActive(player_id));
        }
        if self.active.len() >= MAX_ACTIVE_PLAYERS {
            return Err(SessionError::RosterFull {
                limit: MAX_ACTIVE_PLAYERS,
            });
        }
        Ok(())
    }

    /// Put a player on court starting from `starting` counters.
    pub fn add_active(
        &mut self,
        player_id: Uuid,
        name: String,
        starting: StatLine,
    ) -> Result<&ActivePlayerEntry, SessionError> {
        self.ensure_can_add(player_id)?;
        let entry = self
            .active
            .entry(player_id)
            .or_insert(ActivePlayerEntry {
                player_id,
                name,
                stats: starting,
                flushing: false,
            });
        Ok(entry)
    }

    /// Add `delta` to a counter, clamping at zero. Returns the new value.
    pub fn adjust_stat(
        &mut self,
        player_id: Uuid,
        kind: StatKind,
        delta: i32,
    ) -> Result<u32, SessionError> {
        let entry = self.thawed_entry_mut(player_id)?;
        let counter = entry.stats.get_mut(kind);
        *counter = counter.saturating_add_signed(delta);
        Ok(*counter)
    }

    /// Freeze an entry and return the counters to persist.
    pub fn begin_flush(&mut self, player_id: Uuid) -> Result<StatLine, SessionError> {
        let entry = self.thawed_entry_mut(player_id)?;
        entry.flushing = true;
        Ok(entry.stats)
    }

    /// Freeze every entry that is not already frozen and return their counters.
    pub fn begin_flush_all(&mut self) -> Vec<(Uuid, StatLine)> {
        self.active
            .values_mut()
            .filter(|entry| !entry.flushing)
            .map(|entry| {
                entry.flushing = true;
                (entry.player_id, entry.stats)
            })
            .collect()
    }

    /// Unfreeze an entry after a failed flush; it stays on court with its counters.
    pub fn abort_flush(&mut self, player_id: Uuid) {
        if let Some(entry) = self.active.get_mut(&player_id) {
            entry.flushing = false;
        }
    }

    /// Unfreeze every entry; used when a flush of the whole roster was interrupted.
    pub fn abort_all_flushes(&mut self) {
        for entry in self.active.values_mut() {
            entry.flushing = false;
        }
    }

    /// Drop an entry whose counters were persisted.
    pub fn finish_flush(&mut self, player_id: Uuid) -> Option<ActivePlayerEntry> {
        self.active.shift_remove(&player_id)
    }

    /// Stop the clock, restore the full duration and zero the on-court seconds.
    ///
    /// Points, rebounds and assists are kept and nothing is persisted.
    pub fn reset(&mut self) {
        self.clock = GameClock {
            running: false,
            elapsed_secs: 0,
            time_left_secs: self.game.duration_secs(),
        };
        for entry in self.active.values_mut() {
            entry.stats.seconds_played = 0;
        }
    }

    /// Project the session for clients.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            game: self.game.clone(),
            clock: self.clock,
            players: self.active.values().cloned().collect(),
        }
    }

    fn thawed_entry_mut(&mut self, player_id: Uuid) -> Result<&mut ActivePlayerEntry, SessionError> {
        let entry = self
            .active
            .get_mut(&player_id)
            .ok_or(SessionError::NotActive(player_id))?;
        if entry.flushing {
            return Err(SessionError::FlushInProgress(player_id));
        }
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(duration_minutes: u32) -> GameSession {
        GameSession::new(CurrentGame {
            id: Uuid::new_v4(),
            team_id: Uuid::new_v4(),
            opponent: "Falcons".into(),
            duration_minutes,
        })
    }

    fn add(session: &mut GameSession) -> Uuid {
        let id = Uuid::new_v4();
        session
            .add_active(id, "Player".into(), StatLine::default())
            .unwrap();
        id
    }

    #[test]
    fn new_session_is_paused_with_full_duration() {
        let session = session(32);
        assert_eq!(
            session.clock(),
            GameClock {
                running: false,
                elapsed_secs: 0,
                time_left_secs: 1920,
            }
        );
        assert_eq!(session.active_len(), 0);
    }

    #[test]
    fn thirty_ticks_and_three_adjustments() {
        let mut session = session(32);
        session.start().unwrap();
        let player = add(&mut session);

        for _ in 0..30 {
            assert_eq!(session.tick(), TickOutcome::Advanced);
        }
        session.adjust_stat(player, StatKind::Points, 1).unwrap();
        session.adjust_stat(player, StatKind::Points, 1).unwrap();
        session.adjust_stat(player, StatKind::Points, -1).unwrap();

        let entry = session.entry(player).unwrap();
        assert_eq!(entry.stats.points, 1);
        assert_eq!(entry.stats.seconds_played, 30);
        assert_eq!(session.clock().elapsed_secs, 30);
    }

    #[test]
    fn sixth_player_is_rejected() {
        let mut session = session(32);
        for _ in 0..MAX_ACTIVE_PLAYERS {
            add(&mut session);
        }

        let err = session
            .add_active(Uuid::new_v4(), "Sixth".into(), StatLine::default())
            .unwrap_err();
        assert_eq!(err, SessionError::RosterFull { limit: 5 });
        assert_eq!(session.active_len(), 5);
    }

    #[test]
    fn active_set_never_exceeds_limit() {
        let mut session = session(32);
        let mut added = Vec::new();
        for round in 0..40 {
            let id = Uuid::new_v4();
            if session
                .add_active(id, format!("P{round}"), StatLine::default())
                .is_ok()
            {
                added.push(id);
            }
            if round % 7 == 0 {
                if let Some(id) = added.pop() {
                    session.begin_flush(id).unwrap();
                    session.finish_flush(id);
                }
            }
            assert!(session.active_len() <= MAX_ACTIVE_PLAYERS);
        }
    }

    #[test]
    fn same_player_cannot_be_added_twice() {
        let mut session = session(32);
        let player = add(&mut session);
        assert_eq!(
            session.add_active(player, "Again".into(), StatLine::default()),
            Err(SessionError::AlreadyActive(player))
        );
    }

    #[test]
    fn counters_never_go_below_zero() {
        let mut session = session(32);
        let player = add(&mut session);

        for delta in [-1, 2, -5, -1, 3, -100] {
            session
                .adjust_stat(player, StatKind::Rebounds, delta)
                .unwrap();
            assert!(session.entry(player).unwrap().stats.rebounds < 100);
        }
        assert_eq!(session.entry(player).unwrap().stats.rebounds, 0);
        assert_eq!(
            session.adjust_stat(player, StatKind::Assists, -3).unwrap(),
            0
        );
    }

    #[test]
    fn ticks_are_ignored_while_paused() {
        let mut session = session(32);
        let player = add(&mut session);

        assert_eq!(session.tick(), TickOutcome::Idle);
        session.start().unwrap();
        session.tick();
        session.tick();
        session.pause();
        for _ in 0..10 {
            assert_eq!(session.tick(), TickOutcome::Idle);
        }
        session.start().unwrap();
        session.tick();

        assert_eq!(session.clock().elapsed_secs, 3);
        assert_eq!(session.entry(player).unwrap().stats.seconds_played, 3);
        assert_eq!(session.clock().time_left_secs, 1920 - 3);
    }

    #[test]
    fn reset_zeroes_time_but_keeps_counters() {
        let mut session = session(32);
        let player = add(&mut session);
        session.adjust_stat(player, StatKind::Points, 6).unwrap();
        session.adjust_stat(player, StatKind::Assists, 2).unwrap();
        session.start().unwrap();
        for _ in 0..45 {
            session.tick();
        }
        assert_eq!(session.entry(player).unwrap().stats.seconds_played, 45);

        session.reset();

        let entry = session.entry(player).unwrap();
        assert_eq!(entry.stats.seconds_played, 0);
        assert_eq!(entry.stats.points, 6);
        assert_eq!(entry.stats.assists, 2);
        assert_eq!(entry.stats.rebounds, 0);
        assert!(!session.clock().running);
        assert_eq!(session.clock().elapsed_secs, 0);
        assert_eq!(session.clock().time_left_secs, 1920);
    }

    #[test]
    fn clock_stops_when_time_runs_out() {
        let mut session = session(1);
        session.start().unwrap();
        for _ in 0..59 {
            assert_eq!(session.tick(), TickOutcome::Advanced);
        }
        assert_eq!(session.tick(), TickOutcome::Expired);
        assert!(!session.clock().running);
        assert_eq!(session.tick(), TickOutcome::Idle);
        assert_eq!(session.start(), Err(SessionError::ClockExpired));
        assert_eq!(session.toggle(), Err(SessionError::ClockExpired));
    }

    #[test]
    fn frozen_entries_reject_changes_and_stop_accumulating() {
        let mut session = session(32);
        let player = add(&mut session);
        session.start().unwrap();
        session.tick();

        let flushed = session.begin_flush(player).unwrap();
        session.tick();
        assert_eq!(
            session.adjust_stat(player, StatKind::Points, 1),
            Err(SessionError::FlushInProgress(player))
        );
        assert_eq!(
            session.begin_flush(player),
            Err(SessionError::FlushInProgress(player))
        );
        assert_eq!(session.entry(player).unwrap().stats, flushed);

        session.abort_flush(player);
        session.adjust_stat(player, StatKind::Points, 1).unwrap();
        assert_eq!(session.entry(player).unwrap().stats.points, 1);

        session.begin_flush(player).unwrap();
        let removed = session.finish_flush(player).unwrap();
        assert_eq!(removed.player_id, player);
        assert!(!session.is_active(player));
    }

    #[test]
    fn flush_all_skips_entries_already_frozen() {
        let mut session = session(32);
        let first = add(&mut session);
        let second = add(&mut session);
        session.begin_flush(first).unwrap();

        let pending = session.begin_flush_all();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].0, second);
        assert!(session.entry(second).unwrap().flushing);
    }

    #[test]
    fn toggle_flips_running_flag() {
        let mut session = session(32);
        assert_eq!(session.toggle(), Ok(true));
        assert_eq!(session.toggle(), Ok(false));
    }

    #[test]
    fn snapshot_keeps_insertion_order() {
        let mut session = session(32);
        let ids: Vec<Uuid> = (0..3).map(|_| add(&mut session)).collect();
        let snapshot = session.snapshot();
        let order: Vec<Uuid> = snapshot.players.iter().map(|p| p.player_id).collect();
        assert_eq!(order, ids);
    }
}
