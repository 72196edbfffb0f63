//! Backend for the football predictor: competitions, teams and matches behind an HTTP API.

pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod handler;
pub mod logging;
pub mod model;
pub mod route;
pub mod schema;
pub mod stats;
pub mod store;

use std::sync::Arc;

use config::Settings;
use store::MatchStore;

pub struct AppState {
    pub store: Arc<dyn MatchStore>,
    pub settings: Settings,
}
