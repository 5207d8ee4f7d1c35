//! Runtime configuration read from the environment (and `.env`, loaded by `main`).

use std::env;
use thiserror::Error;

use crate::utils::database::APPDATA_DB;

/// Redirect URI used when `SPOTIFY_REDIRECT_URI` isn't set.
pub const DEFAULT_REDIRECT_URI: &str = "https://localhost/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    #[error("{0} is set but {1} is not")]
    Incomplete(&'static str, &'static str),
}

/// Spotify application credentials registered in the Spotify developer dashboard.
#[derive(Clone, Debug, PartialEq)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub discord_token: String,
    pub database_path: String,
    /// `None` when the bot owner hasn't configured a Spotify application.
    pub spotify: Option<SpotifyCredentials>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let discord_token = non_empty("DISCORD_TOKEN").ok_or(ConfigError::Missing("DISCORD_TOKEN"))?;
        let database_path = non_empty("DATABASE_PATH").unwrap_or_else(|| APPDATA_DB.to_string());

        let spotify = match (non_empty("SPOTIFY_CLIENT_ID"), non_empty("SPOTIFY_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(SpotifyCredentials {
                client_id,
                client_secret,
                redirect_uri: non_empty("SPOTIFY_REDIRECT_URI")
                    .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string()),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete(
                    "SPOTIFY_CLIENT_ID",
                    "SPOTIFY_CLIENT_SECRET",
                ));
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete(
                    "SPOTIFY_CLIENT_SECRET",
                    "SPOTIFY_CLIENT_ID",
                ));
            }
            (None, None) => None,
        };

        Ok(Self {
            discord_token,
            database_path,
            spotify,
        })
    }
}
