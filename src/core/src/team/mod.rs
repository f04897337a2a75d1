use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SquadRole {
    Starting,
    Bench,
    Reserve,
}

/// The fifteen per-player ratings the engine consumes, all in 0.0..=1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAttributes {
    pub strength: f32,
    pub acceleration: f32,
    pub top_speed: f32,
    pub dribble_speed: f32,
    pub jump: f32,
    pub tackling: f32,
    pub ball_keeping: f32,
    pub passing: f32,
    pub long_ball: f32,
    pub agility: f32,
    pub shooting: f32,
    pub shoot_power: f32,
    pub positioning: f32,
    pub reaction: f32,
    pub ball_control: f32,
}

impl PlayerAttributes {
    pub fn average(&self) -> f32 {
        (self.strength
            + self.acceleration
            + self.top_speed
            + self.dribble_speed
            + self.jump
            + self.tackling
            + self.ball_keeping
            + self.passing
            + self.long_ball
            + self.agility
            + self.shooting
            + self.shoot_power
            + self.positioning
            + self.reaction
            + self.ball_control)
            / 15.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub position: String,
    pub roles: Vec<String>,
    pub overall: f32,
    pub potential: f32,
    pub attributes: PlayerAttributes,
    pub age: u32,
    pub height: u32,
    pub weight: u32,
    pub condition: f32,
    pub motivation: f32,
    pub injury_status: String,
    pub squad_role: SquadRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineup {
    pub formation: String,
    pub tactics: serde_json::Value,
    pub starters: Vec<String>,
    pub subs: Vec<String>,
    pub reserves: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner_uid: Option<String>,
    #[serde(default)]
    pub league_id: Option<String>,
    #[serde(default)]
    pub manager: Option<String>,
    pub is_bot: bool,
    #[serde(default)]
    pub bot_id: Option<String>,
    pub players: Vec<PlayerRecord>,
    #[serde(default)]
    pub lineup: Option<Lineup>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Team {
    /// Bare human-owned team record; roster and lineup arrive later through
    /// the squad editor.
    pub fn human(id: String, name: String, owner_uid: Option<String>, now: DateTime<Utc>) -> Self {
        Team {
            id,
            name,
            owner_uid,
            league_id: None,
            manager: None,
            is_bot: false,
            bot_id: None,
            players: Vec::new(),
            lineup: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn player_by_id(&self, player_id: &str) -> Option<&PlayerRecord> {
        self.players.iter().find(|p| p.id == player_id)
    }
}
