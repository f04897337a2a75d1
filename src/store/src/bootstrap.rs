use crate::batch::BulkWriter;
use crate::error::StoreError;
use crate::{Store, fixture_key, slot_key, standing_key};
use chrono::{DateTime, Utc};
use league_core::league::{Fixture, League, Slot, Standing};
use league_core::schedule::{RoundRobinMode, calendar, generate_slot_pairings};
use league_core::utils::IdUtils;
use league_core::utils::rng;
use league_core::{Team, bots};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct BootstrapConfig {
    pub league_count: usize,
    pub capacity: usize,
    pub timezone: String,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            league_count: 25,
            capacity: 15,
            timezone: calendar::LEAGUE_TIMEZONE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapReport {
    pub skipped: bool,
    pub month_key: String,
    pub leagues: usize,
    pub fixtures: usize,
    pub start_date: Option<DateTime<Utc>>,
}

/// Roster materialization request for one filler occupant.
#[derive(Debug, Clone)]
pub struct BotTeamSpec {
    pub bot_id: String,
    pub name: Option<String>,
    pub rating: Option<u32>,
    pub slot_index: Option<u32>,
}

/// Builds the monthly league world: bot pool, leagues, bot-filled slots,
/// zeroed standings and the full double round-robin calendar. Idempotent per
/// month key; a second run for the same month is a skip, not an error.
pub struct Bootstrapper;

impl Bootstrapper {
    pub fn run(
        store: &Store,
        config: &BootstrapConfig,
        now: DateTime<Utc>,
    ) -> Result<BootstrapReport, StoreError> {
        let start_date = calendar::next_month_or_this_month_kickoff(now);
        let month_key = calendar::month_key(start_date);

        let existing = store
            .leagues
            .scan(|_, l| l.month_key.as_deref() == Some(month_key.as_str()));
        if !existing.is_empty() {
            info!("bootstrap skipped: month {} already built", month_key);
            return Ok(BootstrapReport {
                skipped: true,
                month_key,
                leagues: 0,
                fixtures: 0,
                start_date: None,
            });
        }

        let capacity = normalize_capacity(config.capacity);
        ensure_bots(store, config.league_count * capacity, now);

        let mut bot_ids: Vec<String> = store.bots.scan(|_, _| true).into_iter().map(|(id, _)| id).collect();
        bot_ids.sort();

        let template = generate_slot_pairings(capacity, RoundRobinMode::Double);
        let rounds = template.last().map(|p| p.round).unwrap_or(0);

        let mut total_fixtures = 0;
        for league_no in 1..=config.league_count {
            let league_id = IdUtils::new_id();
            let mut league = League::new(
                league_id.clone(),
                format!("Lig {}", league_no),
                1,
                capacity,
                config.timezone.clone(),
                now,
            );
            league.rounds = rounds;
            league.month_key = Some(month_key.clone());
            league
                .schedule_at(start_date)
                .map_err(|e| StoreError::Aborted(e.to_string()))?;
            store.leagues.put(&league_id, league);

            let league_bots = pick_bots_for_league(&bot_ids, league_no - 1, capacity);

            let mut bulk = BulkWriter::new(store);
            for (idx, bot_id) in league_bots.iter().enumerate() {
                let slot_index = (idx + 1) as u32;
                bulk.put(
                    &store.slots,
                    &slot_key(&league_id, slot_index),
                    Slot::bot(league_id.clone(), slot_index, bot_id.clone()),
                );
                let name = store
                    .bots
                    .get(bot_id)
                    .map(|b| b.name)
                    .unwrap_or_else(|| format!("Bot {}", slot_index));
                bulk.put(
                    &store.standings,
                    &standing_key(&league_id, &slot_index.to_string()),
                    Standing::zeroed(
                        league_id.clone(),
                        slot_index.to_string(),
                        Some(slot_index),
                        None,
                        name,
                    ),
                );
            }

            for pairing in &template {
                let match_id = IdUtils::new_id();
                let date = calendar::date_for_round(start_date, pairing.round);
                let fixture = Fixture::new(
                    match_id.clone(),
                    league_id.clone(),
                    pairing.round,
                    date,
                    rng::fnv1a64(&match_id),
                )
                .with_slots(pairing.home_slot, pairing.away_slot);
                bulk.put(&store.fixtures, &fixture_key(&league_id, &match_id), fixture);
                total_fixtures += 1;
            }
            bulk.finish();
        }

        info!(
            "bootstrap complete: {} leagues x {} slots, {} fixtures, month {}",
            config.league_count, capacity, total_fixtures, month_key
        );

        Ok(BootstrapReport {
            skipped: false,
            month_key,
            leagues: config.league_count,
            fixtures: total_fixtures,
            start_date: Some(start_date),
        })
    }
}

/// Capacity below two cannot build a calendar; everything else is allowed,
/// odd values picking up a bye in the generator.
pub fn normalize_capacity(requested: usize) -> usize {
    requested.max(2)
}

/// Tops the filler pool up to `min_count`, never shrinking it.
pub fn ensure_bots(store: &Store, min_count: usize, now: DateTime<Utc>) -> usize {
    let have = store.bots.len();
    if have >= min_count {
        return 0;
    }
    let mut bulk = BulkWriter::new(store);
    for i in (have + 1)..=min_count {
        let id = format!("bot-{}", i);
        let rating = 50 + (i as u32 % 40);
        bulk.put(
            &store.bots,
            &id,
            league_core::Bot {
                id: id.clone(),
                name: format!("Bot {}", i),
                rating,
                created_at: now,
            },
        );
    }
    bulk.finish()
}

fn pick_bots_for_league(bot_ids: &[String], league_offset: usize, count: usize) -> Vec<String> {
    bot_ids
        .iter()
        .cycle()
        .skip(league_offset * count)
        .take(count)
        .cloned()
        .collect()
}

/// Synthesizes and persists the team records behind a set of filler slots.
/// Rosters are derived in parallel, then written create-if-absent so a team
/// that already exists is never rebuilt. Returns one team id per request, in
/// input order.
pub fn materialize_bot_teams(
    store: &Store,
    specs: &[BotTeamSpec],
    now: DateTime<Utc>,
) -> Vec<String> {
    let synthesized: Vec<Team> = specs
        .par_iter()
        .map(|spec| {
            let rating = spec
                .rating
                .or_else(|| store.bots.get(&spec.bot_id).map(|b| b.rating));
            let name = spec.name.clone().unwrap_or_else(|| match spec.slot_index {
                Some(idx) => format!("Bot {}", idx),
                None => format!("Bot {}", &spec.bot_id[..spec.bot_id.len().min(6)]),
            });
            bots::synthesize_team(&spec.bot_id, &name, rating, now)
        })
        .collect();

    let mut ids = Vec::with_capacity(synthesized.len());
    for team in synthesized {
        let id = team.id.clone();
        match store.teams.create(&id, team) {
            Ok(()) | Err(StoreError::AlreadyExists { .. }) => {}
            Err(e) => warn!("bot team {} not persisted: {}", id, e),
        }
        ids.push(id);
    }
    ids
}

/// Single-slot variant used by cleanup paths.
pub fn ensure_bot_team(
    store: &Store,
    bot_id: &str,
    slot_index: Option<u32>,
    now: DateTime<Utc>,
) -> String {
    let existing = bots::bot_team_id(bot_id);
    if store.teams.get(&existing).is_some() {
        return existing;
    }
    materialize_bot_teams(
        store,
        &[BotTeamSpec {
            bot_id: bot_id.to_string(),
            name: None,
            rating: None,
            slot_index,
        }],
        now,
    )
    .pop()
    .expect("one spec yields one id")
}
