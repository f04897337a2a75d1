use super::slot::rewrite_slot_team;
use crate::error::ApiError;
use chrono::{DateTime, Utc};
use league_core::league::Slot;
use itertools::Itertools;
use log::{info, warn};
use serde::Serialize;
use store::bootstrap::ensure_bot_team;
use store::{Store, standing_key};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DedupReport {
    pub teams_with_duplicates: usize,
    pub demoted_slots: Vec<String>,
    pub fixtures_rewritten: usize,
}

/// Picks the authoritative seat when a team is found in more than one slot:
/// prefer the slot matching the team's recorded league, else the most
/// recently locked one, with the slot key as a deterministic last resort.
/// See DESIGN.md for the open question around pathological interleavings.
fn canonical_index(held: &[(String, Slot)], recorded_league: Option<&str>) -> usize {
    if let Some(league_id) = recorded_league {
        if let Some(idx) = held.iter().position(|(_, s)| s.league_id == league_id) {
            return idx;
        }
    }
    held.iter()
        .enumerate()
        .max_by(|(_, (ka, sa)), (_, (kb, sb))| {
            sa.locked_at.cmp(&sb.locked_at).then_with(|| kb.cmp(ka))
        })
        .map(|(idx, _)| idx)
        .expect("duplicates imply a non-empty set")
}

/// Detects teams registered under more than one slot across the whole
/// system, keeps one canonical seat and demotes every other back to a
/// freshly named filler. The fixture fan-out of each demoted slot is cleaned
/// outside the transaction, chunked, since it can touch hundreds of
/// documents.
pub fn dedup_slot_memberships(store: &Store, now: DateTime<Utc>) -> Result<DedupReport, ApiError> {
    let held_by_team = store
        .slots
        .scan(|_, s| s.team_id().is_some())
        .into_iter()
        .map(|(key, slot)| {
            let team = slot.team_id().expect("filtered to held slots").to_string();
            (team, (key, slot))
        })
        .into_group_map();

    let mut report = DedupReport {
        teams_with_duplicates: 0,
        demoted_slots: Vec::new(),
        fixtures_rewritten: 0,
    };

    for (team_id, mut held) in held_by_team {
        if held.len() < 2 {
            continue;
        }
        report.teams_with_duplicates += 1;
        held.sort_by(|a, b| a.0.cmp(&b.0));

        let team_doc = store.teams.get(&team_id);
        let recorded_league = team_doc.as_ref().and_then(|t| t.league_id.as_deref());
        let keep = canonical_index(&held, recorded_league);
        let (canonical_key, canonical_slot) = held[keep].clone();
        info!(
            "team {} found in {} slots; keeping {}",
            team_id,
            held.len(),
            canonical_key
        );

        for (idx, (key, stale)) in held.iter().enumerate() {
            if idx == keep {
                continue;
            }
            let filler_id = format!("dedup-bot-{}", stale.slot_index);

            let demoted = store.run(|tx| {
                let Some(mut slot) = tx.get(&store.slots, key)? else {
                    return Ok(false);
                };
                // Someone already fixed this seat; leave it alone.
                if slot.team_id() != Some(team_id.as_str()) {
                    return Ok(false);
                }
                let st_key = standing_key(&slot.league_id, &slot.slot_index.to_string());
                let standing = tx.get(&store.standings, &st_key)?;

                slot.demote_to_bot(filler_id.clone(), now);
                tx.put(&store.slots, key, slot);
                if let Some(mut row) = standing {
                    row.team_id = None;
                    row.name = format!("Bot {}", stale.slot_index);
                    tx.put(&store.standings, &st_key, row);
                }
                Ok(true)
            })?;

            if !demoted {
                continue;
            }
            report.demoted_slots.push(key.clone());

            // Orphaned fixture references for the demoted seat now point at
            // the filler's team.
            let filler_team = ensure_bot_team(store, &filler_id, Some(stale.slot_index), now);
            report.fixtures_rewritten += rewrite_slot_team(
                store,
                &stale.league_id,
                stale.slot_index,
                Some(filler_team),
            );
        }

        // The team doc follows the canonical seat.
        if let Some(mut team) = team_doc {
            if team.league_id.as_deref() != Some(canonical_slot.league_id.as_str()) {
                warn!(
                    "team {} league pointer moved to canonical league {}",
                    team_id, canonical_slot.league_id
                );
                team.league_id = Some(canonical_slot.league_id.clone());
                team.updated_at = now;
                store.teams.put(&team_id, team);
            }
        }
    }

    info!(
        "slot dedup: {} duplicated teams, {} slots demoted, {} fixtures rewritten",
        report.teams_with_duplicates,
        report.demoted_slots.len(),
        report.fixtures_rewritten
    );
    Ok(report)
}
