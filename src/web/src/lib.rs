mod admin;
mod assign;
mod auth;
mod config;
mod error;
mod leagues;
mod monitor;
mod orchestrate;
mod results;
mod routes;
mod scheduler;

pub use config::{OrchMode, ServerConfig};
pub use error::{ApiError, ApiResult};
pub use orchestrate::{EngineClient, StartQueue};

use crate::routes::ServerRoutes;
use axum::response::IntoResponse;
use log::{error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use store::Store;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;

pub struct AppData {
    pub store: Arc<Store>,
    pub config: Arc<ServerConfig>,
    pub queue: Arc<StartQueue>,
    pub engine: Arc<EngineClient>,
}

impl AppData {
    pub fn new(store: Arc<Store>, config: ServerConfig) -> Self {
        let queue = Arc::new(StartQueue::new(config.shard_count));
        let engine = Arc::new(EngineClient::new(&config));
        AppData {
            store,
            config: Arc::new(config),
            queue,
            engine,
        }
    }
}

impl Clone for AppData {
    fn clone(&self) -> Self {
        AppData {
            store: Arc::clone(&self.store),
            config: Arc::clone(&self.config),
            queue: Arc::clone(&self.queue),
            engine: Arc::clone(&self.engine),
        }
    }
}

pub struct LeagueOpsServer {
    data: AppData,
}

impl LeagueOpsServer {
    pub fn new(data: AppData) -> Self {
        LeagueOpsServer { data }
    }

    pub async fn run(&self) {
        // The sharded dispatch workers drain their channels for the whole
        // process lifetime.
        self.data.queue.spawn_workers(self.data.clone());
        if self.data.config.scheduler_enabled {
            scheduler::spawn(self.data.clone());
        }

        let app = ServerRoutes::create()
            .layer(
                ServiceBuilder::new()
                    // Catch panics in handlers and convert them to 500 errors
                    .layer(CatchPanicLayer::custom(|_err| {
                        (
                            axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                            "Internal server error - handler panicked".to_string(),
                        )
                            .into_response()
                    })),
            )
            .with_state(self.data.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], self.data.config.port));

        let listener = match TcpListener::bind(addr).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Failed to bind to address {}: {}", addr, e);
                panic!("Cannot start server without binding to port");
            }
        };

        info!("listen at: http://localhost:{}", self.data.config.port);

        if let Err(e) = axum::serve(listener, app).await {
            error!("Server error: {}", e);
            error!("Server stopped unexpectedly, but not crashing the process");
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use league_core::league::{Fixture, League, LeagueState};
    use league_core::schedule::{RoundRobinMode, calendar, generate_slot_pairings};
    use league_core::utils::rng;
    use league_core::{Slot, Standing, Team};
    use store::{fixture_key, slot_key, standing_key};

    pub fn app_with_store() -> AppData {
        let config = ServerConfig {
            scheduler_enabled: false,
            ..ServerConfig::default()
        };
        AppData::new(Arc::new(Store::new()), config)
    }

    pub fn test_kickoff() -> DateTime<Utc> {
        calendar::kickoff_on(chrono::NaiveDate::from_ymd_opt(2025, 3, 2).unwrap())
    }

    /// Human team document with no owner restriction.
    pub fn team_doc(store: &Store, team_id: &str) {
        let now = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        store.teams.put(
            team_id,
            Team::human(team_id.to_string(), team_id.to_string(), None, now),
        );
    }

    /// A league in the given state holding one team-less fixture, scheduled
    /// at the canonical test kickoff.
    pub fn fixture_in_league(
        store: &Store,
        league_id: &str,
        match_id: &str,
        state: LeagueState,
    ) -> Fixture {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let mut league = League::new(
            league_id.to_string(),
            format!("League {}", league_id),
            1,
            2,
            calendar::LEAGUE_TIMEZONE.to_string(),
            created,
        );
        league.state = state;
        league.start_date = Some(test_kickoff());
        store.leagues.put(league_id, league);

        let fixture = Fixture::new(
            match_id.to_string(),
            league_id.to_string(),
            1,
            test_kickoff(),
            rng::fnv1a64(match_id),
        );
        store
            .fixtures
            .put(&fixture_key(league_id, match_id), fixture.clone());
        fixture
    }

    /// A membership-style fixture between two named teams, in a league of
    /// the given state.
    pub fn membership_fixture(
        store: &Store,
        league_id: &str,
        match_id: &str,
        home: &str,
        away: &str,
        state: LeagueState,
    ) -> Fixture {
        let fixture = fixture_in_league(store, league_id, match_id, state)
            .with_teams(Some(home.to_string()), Some(away.to_string()));
        store
            .fixtures
            .put(&fixture_key(league_id, match_id), fixture.clone());
        fixture
    }

    /// A bot-filled slot league with standings and a double round-robin
    /// calendar, the shape the bootstrapper produces.
    pub fn bot_league(store: &Store, league_id: &str, capacity: usize) -> String {
        let created = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let template = generate_slot_pairings(capacity, RoundRobinMode::Double);
        let mut league = League::new(
            league_id.to_string(),
            format!("Lig {}", league_id),
            1,
            capacity,
            calendar::LEAGUE_TIMEZONE.to_string(),
            created,
        );
        league.rounds = template.last().map(|p| p.round).unwrap_or(0);
        league.state = LeagueState::Scheduled;
        league.start_date = Some(test_kickoff());
        store.leagues.put(league_id, league);

        for slot_index in 1..=capacity as u32 {
            let bot_id = format!("{}-bot-{}", league_id, slot_index);
            store.slots.put(
                &slot_key(league_id, slot_index),
                Slot::bot(league_id.to_string(), slot_index, bot_id),
            );
            store.standings.put(
                &standing_key(league_id, &slot_index.to_string()),
                Standing::zeroed(
                    league_id.to_string(),
                    slot_index.to_string(),
                    Some(slot_index),
                    None,
                    format!("Bot {}", slot_index),
                ),
            );
        }

        for pairing in &template {
            let match_id = format!("{}-m-{}-{}-{}", league_id, pairing.round, pairing.home_slot, pairing.away_slot);
            let fixture = Fixture::new(
                match_id.clone(),
                league_id.to_string(),
                pairing.round,
                calendar::date_for_round(test_kickoff(), pairing.round),
                rng::fnv1a64(&match_id),
            )
            .with_slots(pairing.home_slot, pairing.away_slot);
            store
                .fixtures
                .put(&fixture_key(league_id, &match_id), fixture);
        }

        league_id.to_string()
    }
}
