use serde::{Deserialize, Serialize};

/// Slot index 0 never occurs in a real league, so it doubles as the bye
/// marker when an odd field gets padded to even.
const BYE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoundRobinMode {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPairing {
    pub round: u32,
    pub home_slot: u32,
    pub away_slot: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamPairing {
    pub round: u32,
    pub home_team_id: String,
    pub away_team_id: String,
}

/// Circle-method round robin over slots `1..=capacity`.
///
/// Slot 1 stays fixed while the rest rotate one position per round. An odd
/// capacity gets a bye entry; pairings touching the bye are suppressed, never
/// emitted. Home and away alternate with round parity so the rotation artifact
/// alone cannot hand one slot an all-home calendar. The double variant replays
/// the single template with sides swapped and rounds offset.
pub fn generate_slot_pairings(capacity: usize, mode: RoundRobinMode) -> Vec<SlotPairing> {
    if capacity < 2 {
        return Vec::new();
    }

    let mut arr: Vec<u32> = (1..=capacity as u32).collect();
    if arr.len() % 2 == 1 {
        arr.push(BYE);
    }

    let m = arr.len();
    let rounds = m - 1;
    let half = m / 2;

    let mut first_leg = Vec::with_capacity(rounds * half);
    for round in 0..rounds {
        for i in 0..half {
            let a = arr[i];
            let b = arr[m - 1 - i];
            if a == BYE || b == BYE {
                continue;
            }
            let even = round % 2 == 0;
            first_leg.push(SlotPairing {
                round: (round + 1) as u32,
                home_slot: if even { a } else { b },
                away_slot: if even { b } else { a },
            });
        }
        // Rotate while keeping index 0 fixed: [0, m-1, 1, 2, ..., m-2]
        let last = arr.pop().expect("rotation array is never empty");
        arr.insert(1, last);
    }

    match mode {
        RoundRobinMode::Single => first_leg,
        RoundRobinMode::Double => {
            let second_leg: Vec<SlotPairing> = first_leg
                .iter()
                .map(|p| SlotPairing {
                    round: p.round + rounds as u32,
                    home_slot: p.away_slot,
                    away_slot: p.home_slot,
                })
                .collect();
            first_leg.into_iter().chain(second_leg).collect()
        }
    }
}

/// Id-flavored variant for membership leagues: the ordered id list maps onto
/// slots `1..=n` and the same template applies.
pub fn generate_team_pairings(team_ids: &[String], mode: RoundRobinMode) -> Vec<TeamPairing> {
    generate_slot_pairings(team_ids.len(), mode)
        .into_iter()
        .map(|p| TeamPairing {
            round: p.round,
            home_team_id: team_ids[(p.home_slot - 1) as usize].clone(),
            away_team_id: team_ids[(p.away_slot - 1) as usize].clone(),
        })
        .collect()
}

/// Number of rounds the template yields for a given capacity.
pub fn round_count(capacity: usize, mode: RoundRobinMode) -> u32 {
    if capacity < 2 {
        return 0;
    }
    let padded = if capacity % 2 == 1 { capacity + 1 } else { capacity };
    let single = (padded - 1) as u32;
    match mode {
        RoundRobinMode::Single => single,
        RoundRobinMode::Double => single * 2,
    }
}
