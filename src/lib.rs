//! Rusty cogs: role self-assignment menus and a Spotify remote control for Discord.
//!
//! Each cog lives under [`commands`] and is gated behind a cargo feature of the same name.

use std::sync::LazyLock;

pub mod commands;
pub mod config;
pub mod events;
pub mod utils;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// Shared HTTP client for every outbound REST call that isn't made through serenity.
pub static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(reqwest::Client::new);

/// User data, which is stored and accessible in all command invocations
pub struct Data {
    pub db: utils::database::Database,
    #[cfg(feature = "roletools")]
    pub settings: commands::roletools::utils::settings_cache::SettingsCache,
    #[cfg(feature = "spotify")]
    pub spotify: commands::spotify::utils::spotify_api::SpotifyClient,
}

impl Data {
    pub fn new(db: utils::database::Database, config: &config::Config) -> Self {
        #[cfg(not(feature = "spotify"))]
        let _ = config;

        Self {
            #[cfg(feature = "roletools")]
            settings: commands::roletools::utils::settings_cache::SettingsCache::new(
                std::sync::Arc::new(db.clone()),
            ),
            #[cfg(feature = "spotify")]
            spotify: commands::spotify::utils::spotify_api::SpotifyClient::new(
                config.spotify.clone(),
            ),
            db,
        }
    }
}

/// Text shown to a user whose command failed. Failures they can't act on are logged.
pub fn describe_error(error: &Error) -> String {
    #[cfg(feature = "spotify")]
    if let Some(e) = error.downcast_ref::<commands::spotify::utils::spotify_api::SpotifyError>() {
        if e.is_unexpected() {
            tracing::error!("Spotify command failed: {}", e);
        }
        return e.user_message().to_string();
    }

    #[cfg(feature = "roletools")]
    if let Some(e) = error.downcast_ref::<commands::roletools::utils::settings_cache::RoleToolsError>() {
        if let commands::roletools::utils::settings_cache::RoleToolsError::Storage(db) = e {
            tracing::error!("Role tools storage failed: {}", db);
            return "Something went wrong saving that, please try again.".to_string();
        }
        return e.to_string();
    }

    if let Some(e) = error.downcast_ref::<utils::database::DbError>() {
        tracing::error!("Database error: {}", e);
        return "Something went wrong saving that, please try again.".to_string();
    }

    error.to_string()
}

#[poise::command(slash_command, category = "General")]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
pub async fn register(ctx: Context<'_>) -> CommandResult {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}
