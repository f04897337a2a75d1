use crate::team::{Lineup, PlayerAttributes, PlayerRecord, SquadRole, Team};
use crate::utils::rng;
use chrono::{DateTime, Utc};
use rand::RngExt;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub const BOT_TEAM_PREFIX: &str = "botteam-";
pub const DEFAULT_FORMATION: &str = "auto";

const STARTER_POSITIONS: [&str; 11] = [
    "GK", "CB", "CB", "LB", "RB", "CM", "CM", "LM", "RM", "ST", "ST",
];
const EXTRA_POSITIONS: [&str; 11] = [
    "GK", "CB", "LB", "RB", "CM", "LM", "RM", "CAM", "LW", "RW", "ST",
];
const BENCH_SIZE: usize = 7;
const RESERVE_SIZE: usize = 4;

/// Pool entry for a filler occupant. The roster itself is not stored here;
/// it is derived from the id on demand, always to the same bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bot {
    pub id: String,
    pub name: String,
    pub rating: u32,
    pub created_at: DateTime<Utc>,
}

pub fn bot_team_id(bot_id: &str) -> String {
    let clean = bot_id.trim();
    if clean.starts_with(BOT_TEAM_PREFIX) {
        clean.to_string()
    } else {
        format!("{}{}", BOT_TEAM_PREFIX, clean)
    }
}

fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

fn build_attributes(base: f32, rng: &mut ChaCha8Rng) -> PlayerAttributes {
    let mut next = || clamp(base + (rng.random_range(0.0..1.0f32) - 0.5) * 0.2, 0.2, 0.99);
    PlayerAttributes {
        strength: next(),
        acceleration: next(),
        top_speed: next(),
        dribble_speed: next(),
        jump: next(),
        tackling: next(),
        ball_keeping: next(),
        passing: next(),
        long_ball: next(),
        agility: next(),
        shooting: next(),
        shoot_power: next(),
        positioning: next(),
        reaction: next(),
        ball_control: next(),
    }
}

fn make_player(
    bot_id: &str,
    player_no: usize,
    position: &str,
    role: SquadRole,
    base: f32,
    rng: &mut ChaCha8Rng,
) -> PlayerRecord {
    let attributes = build_attributes(base, rng);
    let overall = (attributes.average() * 1000.0).round() / 1000.0;
    let potential = clamp(overall + 0.05 + rng.random_range(0.0..0.1f32), 0.35, 1.0);
    let short = &bot_id[..bot_id.len().min(4)];
    PlayerRecord {
        id: player_no.to_string(),
        name: format!("Bot {} #{}", short, player_no),
        position: position.to_string(),
        roles: vec![position.to_string()],
        overall,
        potential,
        attributes,
        age: rng.random_range(18..33),
        height: rng.random_range(170..=195),
        weight: rng.random_range(65..=85),
        condition: 0.7 + rng.random_range(0.0..0.3f32),
        motivation: 0.7 + rng.random_range(0.0..0.3f32),
        injury_status: "healthy".to_string(),
        squad_role: role,
    }
    .rounded()
}

impl PlayerRecord {
    fn rounded(mut self) -> Self {
        self.condition = (self.condition * 1000.0).round() / 1000.0;
        self.motivation = (self.motivation * 1000.0).round() / 1000.0;
        self
    }
}

/// Synthesizes the full filler team for a bot identity. The generator is
/// seeded by the identity string, so the same filler always yields the same
/// starting eleven, bench and reserves.
pub fn synthesize_team(
    bot_id: &str,
    name: &str,
    rating: Option<u32>,
    now: DateTime<Utc>,
) -> Team {
    let mut rng = rng::seeded(bot_id);
    let base = clamp(rating.unwrap_or(60) as f32 / 100.0, 0.45, 0.9);
    log::debug!("synthesizing roster for {} (base {:.2})", bot_id, base);

    let mut players = Vec::with_capacity(STARTER_POSITIONS.len() + BENCH_SIZE + RESERVE_SIZE);
    for (idx, pos) in STARTER_POSITIONS.iter().enumerate() {
        players.push(make_player(bot_id, idx + 1, pos, SquadRole::Starting, base, &mut rng));
    }
    for _ in 0..BENCH_SIZE {
        let pos = EXTRA_POSITIONS[rng.random_range(0..EXTRA_POSITIONS.len())];
        let no = players.len() + 1;
        players.push(make_player(bot_id, no, pos, SquadRole::Bench, base, &mut rng));
    }
    for _ in 0..RESERVE_SIZE {
        let pos = EXTRA_POSITIONS[rng.random_range(0..EXTRA_POSITIONS.len())];
        let no = players.len() + 1;
        players.push(make_player(bot_id, no, pos, SquadRole::Reserve, base, &mut rng));
    }

    let pick = |role: SquadRole| -> Vec<String> {
        players
            .iter()
            .filter(|p| p.squad_role == role)
            .map(|p| p.id.clone())
            .collect()
    };

    let lineup = Lineup {
        formation: DEFAULT_FORMATION.to_string(),
        tactics: serde_json::json!({}),
        starters: pick(SquadRole::Starting),
        subs: pick(SquadRole::Bench),
        reserves: pick(SquadRole::Reserve),
        updated_at: now,
    };

    Team {
        id: bot_team_id(bot_id),
        name: name.to_string(),
        owner_uid: None,
        league_id: None,
        manager: Some("AI".to_string()),
        is_bot: true,
        bot_id: Some(bot_id.to_string()),
        players,
        lineup: Some(lineup),
        created_at: now,
        updated_at: now,
    }
}
