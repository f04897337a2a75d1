use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who currently holds a numbered seat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum SlotKind {
    /// A filler occupant; the seat is open for a human claim.
    Bot { bot_id: String },
    Human { team_id: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub league_id: String,
    pub slot_index: u32,
    #[serde(flatten)]
    pub kind: SlotKind,
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
}

impl Slot {
    pub fn bot(league_id: String, slot_index: u32, bot_id: String) -> Self {
        Slot {
            league_id,
            slot_index,
            kind: SlotKind::Bot { bot_id },
            locked_at: None,
        }
    }

    pub fn is_free_bot(&self) -> bool {
        matches!(self.kind, SlotKind::Bot { .. })
    }

    pub fn team_id(&self) -> Option<&str> {
        match &self.kind {
            SlotKind::Human { team_id } => Some(team_id),
            SlotKind::Bot { .. } => None,
        }
    }

    pub fn bot_id(&self) -> Option<&str> {
        match &self.kind {
            SlotKind::Bot { bot_id } => Some(bot_id),
            SlotKind::Human { .. } => None,
        }
    }

    /// Hands the seat to a human team and stamps the lock time.
    pub fn claim(&mut self, team_id: String, at: DateTime<Utc>) {
        self.kind = SlotKind::Human { team_id };
        self.locked_at = Some(at);
    }

    /// Puts a filler back on the seat (displacement or cleanup).
    pub fn demote_to_bot(&mut self, bot_id: String, at: DateTime<Utc>) {
        self.kind = SlotKind::Bot { bot_id };
        self.locked_at = Some(at);
    }
}

/// Denormalized "this team is in this league" record used for fast existence
/// checks; written atomically with the seat.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub league_id: String,
    pub team_id: String,
    pub name: String,
    pub joined_at: DateTime<Utc>,
}
