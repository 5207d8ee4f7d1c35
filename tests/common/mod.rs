//! Shared helpers for the integration tests.
#![allow(dead_code)]

pub mod fixtures;
#[cfg(feature = "roletools")]
pub mod mocks;

use std::sync::Once;

use rusty_cogs::{Data, config::Config, utils::database::Database};

static INIT: Once = Once::new();

/// Routes tracing output through the test harness.
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("rusty_cogs=debug")
            .with_test_writer()
            .init();
    });
}

pub fn test_config() -> Config {
    Config::from_lookup(|key| match key {
        "DISCORD_TOKEN" => Some(fixtures::DISCORD_TOKEN.to_string()),
        "SPOTIFY_CLIENT_ID" => Some(fixtures::CLIENT_ID.to_string()),
        "SPOTIFY_CLIENT_SECRET" => Some(fixtures::CLIENT_SECRET.to_string()),
        _ => None,
    })
    .expect("test config")
}

/// Bot data over an in-memory database, with Spotify calls sent to `spotify_base`.
#[cfg(feature = "spotify")]
pub fn test_data(spotify_base: &str) -> Data {
    use rusty_cogs::commands::spotify::utils::spotify_api::SpotifyClient;

    let config = test_config();
    let db = Database::open_in_memory().expect("in-memory database");
    let mut data = Data::new(db, &config);
    data.spotify = SpotifyClient::with_base_urls(config.spotify.clone(), spotify_base, spotify_base);
    data
}
