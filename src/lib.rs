pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod initializer;
pub mod orchestrator;
pub mod poller;
pub mod registry;
pub mod reporter;
pub mod store;
pub mod types;

#[cfg(test)]
mod testkit;

/// football-data.org REST API base URL (v4)
pub const FOOTBALL_DATA_API_BASE: &str = "https://api.football-data.org/v4";

/// Event name used when publishing live updates to a form's topic
pub const LIVE_UPDATE_EVENT: &str = "live-update";
