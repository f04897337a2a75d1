pub mod routes;

use league_core::league::Standing;
use store::Store;

/// League table rows sorted the way the standings page shows them: points,
/// then goal difference, then goals scored.
pub fn league_table(store: &Store, league_id: &str) -> Vec<Standing> {
    let mut rows: Vec<Standing> = store
        .standings
        .scan(|_, s| s.league_id == league_id)
        .into_iter()
        .map(|(_, s)| s)
        .collect();
    rows.sort_by(|a, b| {
        b.points
            .cmp(&a.points)
            .then_with(|| b.goal_diff.cmp(&a.goal_diff))
            .then_with(|| b.goals_for.cmp(&a.goals_for))
            .then_with(|| a.key.cmp(&b.key))
    });
    rows
}
