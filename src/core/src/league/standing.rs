use serde::{Deserialize, Serialize};

/// Per-occupant running aggregate within one league. The finalizer is the
/// only writer and applies each finished match exactly once per side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub league_id: String,
    /// Slot index (slot-based leagues) or team id (membership leagues).
    pub key: String,
    #[serde(default)]
    pub slot_index: Option<u32>,
    #[serde(default)]
    pub team_id: Option<String>,
    pub name: String,
    pub played: u32,
    pub won: u32,
    pub drawn: u32,
    pub lost: u32,
    pub goals_for: u32,
    pub goals_against: u32,
    pub goal_diff: i64,
    pub points: u32,
}

impl Standing {
    pub fn zeroed(
        league_id: String,
        key: String,
        slot_index: Option<u32>,
        team_id: Option<String>,
        name: String,
    ) -> Self {
        Standing {
            league_id,
            key,
            slot_index,
            team_id,
            name,
            played: 0,
            won: 0,
            drawn: 0,
            lost: 0,
            goals_for: 0,
            goals_against: 0,
            goal_diff: 0,
            points: 0,
        }
    }

    /// Standard points rule: win 3, draw 1, loss 0.
    pub fn record_result(&mut self, scored: u32, conceded: u32) {
        self.played += 1;
        self.goals_for += scored;
        self.goals_against += conceded;
        self.goal_diff = self.goals_for as i64 - self.goals_against as i64;
        if scored > conceded {
            self.won += 1;
            self.points += 3;
        } else if scored < conceded {
            self.lost += 1;
        } else {
            self.drawn += 1;
            self.points += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero(name: &str) -> Standing {
        Standing::zeroed("lg1".into(), name.into(), None, Some(name.into()), name.into())
    }

    #[test]
    fn test_home_win_two_one() {
        let mut home = zero("h");
        let mut away = zero("a");
        home.record_result(2, 1);
        away.record_result(1, 2);

        assert_eq!((home.played, home.won, home.drawn, home.lost), (1, 1, 0, 0));
        assert_eq!((home.goals_for, home.goals_against), (2, 1));
        assert_eq!(home.goal_diff, 1);
        assert_eq!(home.points, 3);

        assert_eq!((away.played, away.won, away.drawn, away.lost), (1, 0, 0, 1));
        assert_eq!((away.goals_for, away.goals_against), (1, 2));
        assert_eq!(away.goal_diff, -1);
        assert_eq!(away.points, 0);
    }

    #[test]
    fn test_draw_gives_one_point_each() {
        let mut home = zero("h");
        let mut away = zero("a");
        home.record_result(1, 1);
        away.record_result(1, 1);
        assert_eq!(home.points, 1);
        assert_eq!(away.points, 1);
        assert_eq!(home.drawn, 1);
    }

    #[test]
    fn test_aggregates_accumulate() {
        let mut s = zero("h");
        s.record_result(3, 0);
        s.record_result(0, 2);
        s.record_result(1, 1);
        assert_eq!(s.played, 3);
        assert_eq!(s.points, 4);
        assert_eq!(s.goal_diff, 1);
    }
}
