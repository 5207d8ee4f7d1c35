use poise::CreateReply;
use tracing::info;

use super::utils::uri::{ReactionAction, parse_actions, toggle_listen};
use crate::config::{DEFAULT_REDIRECT_URI, SpotifyCredentials};
use crate::{CommandResult, Context};

/// Personal Spotify settings
#[poise::command(
    slash_command,
    subcommands("listen", "showprivate", "creds", "forgetme"),
    subcommand_required
)]
pub async fn set(_: Context<'_>) -> CommandResult {
    Ok(())
}

fn join_actions(actions: &[ReactionAction]) -> String {
    actions
        .iter()
        .map(|a| format!("{} {}", a.emoji(), a))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Reply for a listener toggle.
pub fn listen_message(added: &[ReactionAction], removed: &[ReactionAction]) -> String {
    let mut message = String::new();
    if !added.is_empty() {
        message.push_str(&format!(
            "I will now listen for {} reactions.\n",
            join_actions(added)
        ));
    }
    if !removed.is_empty() {
        message.push_str(&format!(
            "I will stop listening for {} reactions.\n",
            join_actions(removed)
        ));
    }
    message
}

/// Toggle which reactions on Spotify links I act on for you
#[poise::command(slash_command)]
async fn listen(
    ctx: Context<'_>,
    #[description = "play, like, or both separated by a space"] listen_for: String,
) -> CommandResult {
    let requested = parse_actions(&listen_for);
    if requested.is_empty() {
        return Err("I can listen for `play` (⏯️) and `like` (❤️) reactions.".into());
    }

    let user_id = ctx.author().id.get();
    let db = &ctx.data().db;
    let current = db.get_spotify_user(user_id)?.listen_for;
    let toggle = toggle_listen(&current, &requested);
    db.set_listen_for(user_id, &toggle.listen_for)?;

    ctx.send(
        CreateReply::default()
            .content(listen_message(&toggle.added, &toggle.removed))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Set whether your private playlists and Spotify name are shown outside of DMs
#[poise::command(slash_command)]
async fn showprivate(
    ctx: Context<'_>,
    #[description = "Show private details"] show_private: bool,
) -> CommandResult {
    ctx.data()
        .db
        .set_show_private(ctx.author().id.get(), show_private)?;
    ctx.send(
        CreateReply::default()
            .content(if show_private {
                "I will show your private playlists and Spotify name in servers now."
            } else {
                "I will stop showing your private playlists and Spotify name in servers now."
            })
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Instructions for the bot's Spotify application, or set its credentials
#[poise::command(slash_command, owners_only)]
async fn creds(
    ctx: Context<'_>,
    #[description = "Client ID of your Spotify application"] client_id: Option<String>,
    #[description = "Client secret of your Spotify application"] client_secret: Option<String>,
    #[description = "Redirect URI registered for the application"] redirect_uri: Option<String>,
) -> CommandResult {
    let reply = match (client_id, client_secret) {
        (Some(client_id), Some(client_secret)) => {
            let redirect_uri = redirect_uri
                .or_else(|| ctx.data().spotify.credentials().ok().map(|c| c.redirect_uri))
                .unwrap_or_else(|| DEFAULT_REDIRECT_URI.to_string());
            ctx.data().spotify.set_credentials(SpotifyCredentials {
                client_id,
                client_secret,
                redirect_uri,
            });
            info!("Spotify credentials updated by {}", ctx.author().id);
            "Your Spotify credentials have been set. Put them in `SPOTIFY_CLIENT_ID` and \
             `SPOTIFY_CLIENT_SECRET` as well to keep them across restarts."
                .to_string()
        }
        (None, None) => format!(
            "1. Go to Spotify developers and log in with your Spotify account.\n\
             (https://developer.spotify.com/dashboard/applications)\n\
             2. Click \"Create An App\".\n\
             3. Fill out the form provided with your app name, etc.\n\
             4. When asked if you're developing commercial integration select \"No\".\n\
             5. Accept the terms and conditions.\n\
             6. Set `SPOTIFY_CLIENT_ID` and `SPOTIFY_CLIENT_SECRET` in the bot's environment, \
             or run this command with `client_id` and `client_secret`.\n\
             You may also set `SPOTIFY_REDIRECT_URI`, the default is {}\n\n\
             Note: The redirect URI must be registered in the Spotify Dashboard.",
            DEFAULT_REDIRECT_URI
        ),
        _ => return Err("Provide both the client ID and the client secret.".into()),
    };

    ctx.send(CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}

/// Forget all your Spotify settings and credentials
#[poise::command(slash_command)]
async fn forgetme(ctx: Context<'_>) -> CommandResult {
    ctx.data().db.clear_spotify_user(ctx.author().id.get())?;
    info!("Cleared Spotify data for {}", ctx.author().id);
    ctx.send(
        CreateReply::default()
            .content("All your spotify data deleted from my settings.")
            .ephemeral(true),
    )
    .await?;
    Ok(())
}
