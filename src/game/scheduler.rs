//! Cancelable timed stages keyed by owning player and session
//!
//! Multi-stage sequences (the reload magazine chain, the vault tween finish)
//! are scheduled here instead of as detached timers. Cancelling a session
//! drops every stage it still has pending, so a state exit can invalidate a
//! whole chain at once.

use std::collections::HashSet;

use super::loadout::LoadoutSlot;
use super::PlayerId;

pub type SessionId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadStage {
    /// Pull a magazine from the pouch (spawn one if none is staged)
    FetchMagazine,
    /// Bring it to the weapon
    InsertMagazine,
    /// Seat it
    SeatMagazine,
    Complete,
}

impl ReloadStage {
    /// Share of the reload time spent before this stage fires
    pub fn lead_fraction(self) -> f32 {
        match self {
            ReloadStage::FetchMagazine => 0.2,
            ReloadStage::InsertMagazine => 0.25,
            ReloadStage::SeatMagazine => 0.3,
            ReloadStage::Complete => 0.25,
        }
    }

    pub fn next(self) -> Option<ReloadStage> {
        match self {
            ReloadStage::FetchMagazine => Some(ReloadStage::InsertMagazine),
            ReloadStage::InsertMagazine => Some(ReloadStage::SeatMagazine),
            ReloadStage::SeatMagazine => Some(ReloadStage::Complete),
            ReloadStage::Complete => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimedStage {
    Reload {
        slot: LoadoutSlot,
        stage: ReloadStage,
    },
    VaultFinish,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledStage {
    pub owner: PlayerId,
    pub session: SessionId,
    pub due: f64,
    pub stage: TimedStage,
}

#[derive(Debug, Default)]
pub struct CosmeticScheduler {
    next_session: SessionId,
    live: HashSet<(PlayerId, SessionId)>,
    pending: Vec<ScheduledStage>,
}

impl CosmeticScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_session(&mut self, owner: PlayerId) -> SessionId {
        self.next_session += 1;
        let session = self.next_session;
        self.live.insert((owner, session));
        session
    }

    pub fn is_live(&self, owner: PlayerId, session: SessionId) -> bool {
        self.live.contains(&(owner, session))
    }

    /// Queue a stage. Stages for sessions that were already cancelled are
    /// dropped; returns whether the stage was queued.
    pub fn schedule(
        &mut self,
        owner: PlayerId,
        session: SessionId,
        due: f64,
        stage: TimedStage,
    ) -> bool {
        if !self.is_live(owner, session) {
            return false;
        }
        self.pending.push(ScheduledStage {
            owner,
            session,
            due,
            stage,
        });
        true
    }

    /// Drop a session and everything it has pending
    pub fn cancel(&mut self, owner: PlayerId, session: SessionId) {
        self.live.remove(&(owner, session));
        self.pending
            .retain(|s| !(s.owner == owner && s.session == session));
    }

    /// Drop every session of a player (disconnect)
    pub fn cancel_owner(&mut self, owner: PlayerId) {
        self.live.retain(|(o, _)| *o != owner);
        self.pending.retain(|s| s.owner != owner);
    }

    /// Remove and return every stage due at `now`, earliest first.
    ///
    /// Running one stage may cancel its session; callers check
    /// [`CosmeticScheduler::is_live`] before running each returned stage.
    pub fn drain_due(&mut self, now: f64) -> Vec<ScheduledStage> {
        let (mut due, pending): (Vec<_>, Vec<_>) =
            self.pending.drain(..).partition(|s| s.due <= now);
        self.pending = pending;
        due.sort_by(|a, b| a.due.total_cmp(&b.due));
        due
    }

    pub fn pending_for(&self, owner: PlayerId) -> usize {
        self.pending.iter().filter(|s| s.owner == owner).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const FETCH: TimedStage = TimedStage::Reload {
        slot: LoadoutSlot::Primary,
        stage: ReloadStage::FetchMagazine,
    };

    #[test]
    fn cancelling_a_session_drops_its_chain() {
        let mut scheduler = CosmeticScheduler::new();
        let owner = Uuid::new_v4();
        let session = scheduler.begin_session(owner);

        assert!(scheduler.schedule(owner, session, 1.0, FETCH));
        assert!(scheduler.schedule(owner, session, 2.0, TimedStage::VaultFinish));
        scheduler.cancel(owner, session);

        assert!(scheduler.drain_due(10.0).is_empty());
        // later links of the chain cannot be re-added
        assert!(!scheduler.schedule(owner, session, 3.0, FETCH));
    }

    #[test]
    fn drain_returns_due_stages_in_order() {
        let mut scheduler = CosmeticScheduler::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let sa = scheduler.begin_session(a);
        let sb = scheduler.begin_session(b);

        scheduler.schedule(a, sa, 0.5, TimedStage::VaultFinish);
        scheduler.schedule(b, sb, 0.2, FETCH);
        scheduler.schedule(a, sa, 4.0, FETCH);

        let due = scheduler.drain_due(1.0);
        assert_eq!(due.len(), 2);
        assert_eq!(due[0].owner, b);
        assert_eq!(due[1].owner, a);
        assert_eq!(scheduler.pending_for(a), 1);
    }

    #[test]
    fn sessions_of_other_players_survive_cancel_owner() {
        let mut scheduler = CosmeticScheduler::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let sa = scheduler.begin_session(a);
        let sb = scheduler.begin_session(b);
        scheduler.schedule(a, sa, 1.0, FETCH);
        scheduler.schedule(b, sb, 1.0, FETCH);

        scheduler.cancel_owner(a);
        assert!(!scheduler.is_live(a, sa));
        assert!(scheduler.is_live(b, sb));
        assert_eq!(scheduler.drain_due(1.0).len(), 1);
    }

    #[test]
    fn reload_fractions_cover_the_whole_reload() {
        let mut stage = Some(ReloadStage::FetchMagazine);
        let mut total = 0.0;
        while let Some(s) = stage {
            total += s.lead_fraction();
            stage = s.next();
        }
        assert!((total - 1.0).abs() < 1e-6);
    }
}
