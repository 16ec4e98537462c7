use dashmap::DashMap;
use uuid::Uuid;

use crate::dao::models::PlayerEntity;

/// Per-team copy of the roster, filled on first read and dropped on every roster write.
#[derive(Default)]
pub struct RosterCache {
    teams: DashMap<Uuid, Vec<PlayerEntity>>,
}

impl RosterCache {
    /// Cached roster of a team.
    pub fn get(&self, team_id: Uuid) -> Option<Vec<PlayerEntity>> {
        self.teams.get(&team_id).map(|players| players.clone())
    }

    /// Store the roster read from storage.
    pub fn fill(&self, team_id: Uuid, players: Vec<PlayerEntity>) {
        self.teams.insert(team_id, players);
    }

    /// Forget the cached roster of a team.
    pub fn invalidate(&self, team_id: Uuid) {
        self.teams.remove(&team_id);
    }

    /// Forget every cached roster.
    pub fn clear(&self) {
        self.teams.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use super::*;

    #[test]
    fn invalidation_is_scoped_to_one_team() {
        let cache = RosterCache::default();
        let (team_a, team_b) = (Uuid::new_v4(), Uuid::new_v4());
        let player = PlayerEntity {
            id: Uuid::new_v4(),
            team_id: team_a,
            name: "Mia".into(),
            created_at: SystemTime::now(),
        };
        cache.fill(team_a, vec![player.clone()]);
        cache.fill(team_b, Vec::new());

        cache.invalidate(team_a);

        assert_eq!(cache.get(team_a), None);
        assert_eq!(cache.get(team_b), Some(Vec::new()));
    }
}
