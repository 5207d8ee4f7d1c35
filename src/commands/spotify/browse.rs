use poise::CreateReply;
use tracing::warn;

use super::access_token;
use super::utils::{
    embedded_messages::{
        album_embed, artist_embed, episode_embed, link_line, playlist_embed, show_embed,
        profile_embed, track_embed, track_line,
    },
    models::{SearchResults, Track},
    pagination::{Page, build_pages, paginate},
    spotify_api::SpotifyError,
    uri::{SearchType, parse_recommendations},
};
use crate::{CommandResult, Context};

/// Pages of tracks, one per track when detailed.
pub fn track_pages(tracks: &[Track], title: &str, detailed: bool) -> Vec<Page> {
    build_pages(tracks, title, detailed, track_embed, track_line, |t| t.uri.clone())
}

/// Turns search results of the requested type into pages.
pub fn search_pages(results: &SearchResults, search_type: SearchType, detailed: bool) -> Vec<Page> {
    let title = "Search results";
    match search_type {
        SearchType::Track => results
            .tracks
            .as_ref()
            .map(|p| track_pages(&p.items, title, detailed)),
        SearchType::Artist => results.artists.as_ref().map(|p| {
            build_pages(
                &p.items,
                title,
                detailed,
                artist_embed,
                |a| link_line(&a.name, &a.external_urls),
                |a| a.uri.clone(),
            )
        }),
        SearchType::Album => results.albums.as_ref().map(|p| {
            build_pages(
                &p.items,
                title,
                detailed,
                album_embed,
                |a| link_line(&a.name, &a.external_urls),
                |a| a.uri.clone(),
            )
        }),
        SearchType::Playlist => results.playlists.as_ref().map(|p| {
            build_pages(
                &p.items,
                title,
                detailed,
                playlist_embed,
                |pl| link_line(&pl.name, &pl.external_urls),
                |pl| pl.uri.clone(),
            )
        }),
        SearchType::Show => results.shows.as_ref().map(|p| {
            build_pages(
                &p.items,
                title,
                detailed,
                show_embed,
                |s| link_line(&s.name, &s.external_urls),
                |s| s.uri.clone(),
            )
        }),
        SearchType::Episode => results.episodes.as_ref().map(|p| {
            build_pages(
                &p.items,
                title,
                detailed,
                episode_embed,
                |e| link_line(&e.name, &e.external_urls),
                |e| e.uri.clone(),
            )
        }),
    }
    .unwrap_or_default()
}

/// Show your Spotify settings, and your profile when an account is linked
#[poise::command(slash_command)]
pub async fn me(ctx: Context<'_>) -> CommandResult {
    let settings = ctx.data().db.get_spotify_user(ctx.author().id.get())?;
    let user = match settings.token {
        Some(_) => {
            let token = access_token(ctx).await?;
            Some(ctx.data().spotify.me(&token).await?)
        }
        None => None,
    };
    let embed = profile_embed(
        ctx.author(),
        &settings.listen_for,
        settings.show_private,
        user.as_ref(),
        ctx.guild_id().is_none(),
    );
    ctx.send(CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Search Spotify
#[poise::command(slash_command)]
pub async fn search(
    ctx: Context<'_>,
    #[description = "What to search for"] query: String,
    #[description = "What kind of result to look for, tracks by default"] search_type: Option<SearchType>,
    #[description = "Show one result per page"] detailed: Option<bool>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let search_type = search_type.unwrap_or(SearchType::Track);
    let results = ctx
        .data()
        .spotify
        .search(&token, &query, search_type)
        .await?;

    let pages = search_pages(&results, search_type, detailed.unwrap_or(false));
    if pages.is_empty() {
        ctx.say(format!(
            "No {} could be found matching that query.",
            search_type.as_str()
        ))
        .await?;
        return Ok(());
    }
    paginate(ctx, pages).await
}

/// Get recommendations, e.g. `genre:rock energy:80` plus track or artist links
#[poise::command(slash_command)]
pub async fn recommendations(
    ctx: Context<'_>,
    #[description = "Seeds and targets such as genre:rock danceability:70 mode:minor"] parameters: String,
    #[description = "Show one track per page"] detailed: Option<bool>,
) -> CommandResult {
    let params = parse_recommendations(&parameters)?;
    let token = access_token(ctx).await?;
    let recommendations = match ctx.data().spotify.recommendations(&token, &params).await {
        Ok(recommendations) => recommendations,
        Err(SpotifyError::Api { status, message }) if status.is_client_error() => {
            warn!("Recommendations rejected: {} - {}", status, message);
            return Err("I could not find any recommendations with those parameters".into());
        }
        Err(SpotifyError::NotFound(message)) => {
            warn!("Recommendations not found: {}", message);
            return Err("I could not find any recommendations with those parameters".into());
        }
        Err(e) => return Err(e.into()),
    };

    if recommendations.tracks.is_empty() {
        ctx.say("No recommendations could be found that query.").await?;
        return Ok(());
    }
    paginate(
        ctx,
        track_pages(&recommendations.tracks, "Recommendations", detailed.unwrap_or(false)),
    )
    .await
}

/// Show your recently played tracks
#[poise::command(slash_command)]
pub async fn recent(
    ctx: Context<'_>,
    #[description = "Show one track per page"] detailed: Option<bool>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let recent = ctx.data().spotify.recently_played(&token).await?;
    let tracks: Vec<Track> = recent.items.into_iter().map(|h| h.track).collect();
    if tracks.is_empty() {
        ctx.say("You haven't played anything recently.").await?;
        return Ok(());
    }
    paginate(ctx, track_pages(&tracks, "Recently played", detailed.unwrap_or(false))).await
}

/// Show your most played tracks
#[poise::command(slash_command)]
pub async fn toptracks(
    ctx: Context<'_>,
    #[description = "Show one track per page"] detailed: Option<bool>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let top = ctx.data().spotify.top_tracks(&token).await?;
    if top.items.is_empty() {
        ctx.say("You don't have any top tracks yet.").await?;
        return Ok(());
    }
    paginate(ctx, track_pages(&top.items, "Top tracks", detailed.unwrap_or(false))).await
}

/// Show your most played artists
#[poise::command(slash_command)]
pub async fn topartists(
    ctx: Context<'_>,
    #[description = "Show one artist per page"] detailed: Option<bool>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let top = ctx.data().spotify.top_artists(&token).await?;
    if top.items.is_empty() {
        ctx.say("You don't have any top artists yet.").await?;
        return Ok(());
    }
    let pages = build_pages(
        &top.items,
        "Top artists",
        detailed.unwrap_or(false),
        artist_embed,
        |a| link_line(&a.name, &a.external_urls),
        |a| a.uri.clone(),
    );
    paginate(ctx, pages).await
}

/// Show new releases on Spotify
#[poise::command(slash_command)]
pub async fn new(
    ctx: Context<'_>,
    #[description = "Show one album per page"] detailed: Option<bool>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let releases = ctx.data().spotify.new_releases(&token).await?;
    let pages = build_pages(
        &releases.albums.items,
        "New releases",
        detailed.unwrap_or(false),
        album_embed,
        |a| link_line(&a.name, &a.external_urls),
        |a| a.uri.clone(),
    );
    paginate(ctx, pages).await
}
