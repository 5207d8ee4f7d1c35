//! This module aggregates all the command modules for the bot.

use crate::{Data, Error};

/// Role self-assignment menus, role flags and member events (requires the `roletools` feature).
#[cfg(feature = "roletools")]
pub mod roletools;

/// Spotify playback, browsing and reaction listeners (requires the `spotify` feature).
#[cfg(feature = "spotify")]
pub mod spotify;

/// Every command the bot registers, depending on the enabled features.
pub fn all() -> Vec<poise::Command<Data, Error>> {
    let mut commands = vec![crate::register(), crate::help()];

    #[cfg(feature = "roletools")]
    commands.push(roletools::roletools());

    #[cfg(feature = "spotify")]
    commands.push(spotify::spotify());

    commands
}
