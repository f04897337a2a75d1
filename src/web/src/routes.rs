use crate::AppData;
use crate::admin;
use crate::assign;
use crate::leagues;
use crate::monitor;
use crate::orchestrate;
use crate::results;
use axum::Router;

pub struct ServerRoutes;

impl ServerRoutes {
    pub fn create() -> Router<AppData> {
        Router::<AppData>::new()
            .merge(assign::routes::routes())
            .merge(admin::routes::routes())
            .merge(orchestrate::routes::routes())
            .merge(results::routes::routes())
            .merge(monitor::routes::routes())
            .merge(leagues::routes::routes())
    }
}
