use tracing::info;

use super::access_token;
use super::utils::{
    embedded_messages::{link_line, playlist_embed},
    models::SimplePlaylist,
    pagination::{Page, build_pages, paginate},
    uri::{UriKind, find_uris, ids_of},
};
use crate::{CommandResult, Context, Error};

/// Manage your playlists
#[poise::command(
    slash_command,
    subcommands("featured", "list", "view", "create", "add", "remove", "follow"),
    subcommand_required
)]
pub async fn playlist(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// The followed playlist with exactly this name, ignoring case.
pub fn find_playlist<'a>(playlists: &'a [SimplePlaylist], name: &str) -> Option<&'a SimplePlaylist> {
    let name = name.trim();
    playlists.iter().find(|p| p.name.eq_ignore_ascii_case(name))
}

/// Drops playlists marked private unless the user wants them shown.
/// Playlists whose visibility is unknown are kept.
pub fn visible_playlists(playlists: Vec<SimplePlaylist>, show_private: bool) -> Vec<SimplePlaylist> {
    if show_private {
        return playlists;
    }
    playlists
        .into_iter()
        .filter(|p| p.public != Some(false))
        .collect()
}

/// Private playlists are shown in DMs or when the user turned on `set showprivate`.
fn shows_private(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.guild_id().is_none() {
        return Ok(true);
    }
    Ok(ctx
        .data()
        .db
        .get_spotify_user(ctx.author().id.get())?
        .show_private)
}

/// The user's followed playlists that may be listed where the command ran.
async fn listed_playlists(ctx: Context<'_>, token: &str) -> Result<Vec<SimplePlaylist>, Error> {
    let playlists = ctx.data().spotify.all_followed_playlists(token).await?;
    Ok(visible_playlists(playlists, shows_private(ctx)?))
}

/// Track URIs from the links given to `add` and `remove`.
fn track_uris(links: &str) -> Vec<String> {
    find_uris(links)
        .into_iter()
        .filter(|uri| uri.kind == UriKind::Track)
        .map(|uri| uri.to_string())
        .collect()
}

async fn owned_playlist(ctx: Context<'_>, token: &str, name: &str) -> Result<SimplePlaylist, Error> {
    let playlists = ctx.data().spotify.all_followed_playlists(token).await?;
    find_playlist(&playlists, name)
        .cloned()
        .ok_or_else(|| format!("I could not find a playlist matching {}.", name).into())
}

fn playlist_pages(playlists: &[SimplePlaylist], title: &str, detailed: bool) -> Vec<Page> {
    build_pages(
        playlists,
        title,
        detailed,
        playlist_embed,
        |p| link_line(&p.name, &p.external_urls),
        |p| p.uri.clone(),
    )
}

/// Show Spotify's featured playlists
#[poise::command(slash_command)]
async fn featured(ctx: Context<'_>) -> CommandResult {
    let token = access_token(ctx).await?;
    let featured = ctx.data().spotify.featured_playlists(&token).await?;
    let title = featured.message.as_deref().unwrap_or("Featured playlists");
    paginate(ctx, playlist_pages(&featured.playlists.items, title, true)).await
}

/// List the names of your playlists. Private ones only show in DMs or with `set showprivate`
#[poise::command(slash_command)]
async fn list(ctx: Context<'_>) -> CommandResult {
    let token = access_token(ctx).await?;
    let playlists = listed_playlists(ctx, &token).await?;
    if playlists.is_empty() {
        ctx.say("I couldn't find any playlists to show here.").await?;
        return Ok(());
    }
    paginate(ctx, playlist_pages(&playlists, "Your playlists", false)).await
}

/// Browse your playlists one at a time. Private ones only show in DMs or with `set showprivate`
#[poise::command(slash_command)]
async fn view(ctx: Context<'_>) -> CommandResult {
    let token = access_token(ctx).await?;
    let playlists = listed_playlists(ctx, &token).await?;
    if playlists.is_empty() {
        ctx.say("I couldn't find any playlists to show here.").await?;
        return Ok(());
    }
    paginate(ctx, playlist_pages(&playlists, "Your playlists", true)).await
}

/// Create a new playlist
#[poise::command(slash_command)]
async fn create(
    ctx: Context<'_>,
    #[description = "Name of the playlist"] name: String,
    #[description = "Whether the playlist is public, private by default"] public: Option<bool>,
    #[description = "Description of the playlist"] description: Option<String>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let client = &ctx.data().spotify;
    let user = client.me(&token).await?;
    let playlist = client
        .create_playlist(
            &token,
            &user.id,
            &name,
            public.unwrap_or(false),
            description.as_deref().unwrap_or(""),
        )
        .await?;
    info!("User {} created playlist {}", ctx.author().id, playlist.id);
    ctx.say(format!(
        "Created {}.",
        link_line(&playlist.name, &playlist.external_urls)
    ))
    .await?;
    Ok(())
}

/// Add tracks to one of your playlists
#[poise::command(slash_command)]
async fn add(
    ctx: Context<'_>,
    #[description = "Exact name of the playlist"] name: String,
    #[description = "Spotify track links"] tracks: String,
) -> CommandResult {
    let uris = track_uris(&tracks);
    if uris.is_empty() {
        return Err("You did not provide any tracks for me to add to the playlist.".into());
    }
    let token = access_token(ctx).await?;
    let playlist = owned_playlist(ctx, &token, &name).await?;
    ctx.data()
        .spotify
        .add_playlist_tracks(&token, &playlist.id, &uris)
        .await?;
    ctx.say(format!("Added {} tracks to {}.", uris.len(), playlist.name))
        .await?;
    Ok(())
}

/// Remove tracks from one of your playlists
#[poise::command(slash_command)]
async fn remove(
    ctx: Context<'_>,
    #[description = "Exact name of the playlist"] name: String,
    #[description = "Spotify track links"] tracks: String,
) -> CommandResult {
    let uris = track_uris(&tracks);
    if uris.is_empty() {
        return Err("You did not provide any tracks for me to remove from the playlist.".into());
    }
    let token = access_token(ctx).await?;
    let playlist = owned_playlist(ctx, &token, &name).await?;
    ctx.data()
        .spotify
        .remove_playlist_tracks(&token, &playlist.id, &uris)
        .await?;
    ctx.say(format!("Removed {} tracks from {}.", uris.len(), playlist.name))
        .await?;
    Ok(())
}

/// Follow playlists by link
#[poise::command(slash_command)]
async fn follow(
    ctx: Context<'_>,
    #[description = "Spotify playlist links"] playlists: String,
    #[description = "Show the playlists on your public profile, yes by default"] public: Option<bool>,
) -> CommandResult {
    let ids = ids_of(&find_uris(&playlists), UriKind::Playlist);
    if ids.is_empty() {
        return Err("You did not provide any playlists for me to add to your library.".into());
    }
    let token = access_token(ctx).await?;
    for id in &ids {
        ctx.data()
            .spotify
            .follow_playlist(&token, id, public.unwrap_or(true))
            .await?;
    }
    ctx.say(format!("Now following {} playlists.", ids.len()))
        .await?;
    Ok(())
}
