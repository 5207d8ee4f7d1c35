//! Control Spotify playback and browse a user's library from Discord.

pub(crate) mod artist;
pub(crate) mod browse;
pub(crate) mod playback;
pub(crate) mod playlist;
pub(crate) mod set;

pub mod utils;

use crate::{CommandResult, Context, Error};
use utils::auth::user_access_token;

/// Spotify commands
#[poise::command(
    slash_command,
    subcommand_required,
    subcommands(
        "playback::now",
        "playback::pause",
        "playback::resume",
        "playback::next",
        "playback::previous",
        "playback::play",
        "playback::queue",
        "playback::repeat",
        "playback::shuffle",
        "playback::seek",
        "playback::volume",
        "playback::device",
        "browse::me",
        "browse::search",
        "browse::recommendations",
        "browse::recent",
        "browse::toptracks",
        "browse::topartists",
        "browse::new",
        "playlist::playlist",
        "artist::artist",
        "set::set",
    ),
    category = "Spotify"
)]
pub async fn spotify(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// Resolves the invoker's access token, prompting for authorization if needed, then defers the
/// reply while Spotify is queried.
async fn access_token(ctx: Context<'_>) -> Result<String, Error> {
    let token = user_access_token(ctx).await?;
    ctx.defer().await?;
    Ok(token)
}
