use super::access_token;
use super::utils::{
    embedded_messages::{album_embed, link_line},
    pagination::{build_pages, paginate},
    uri::{UriKind, find_uris, ids_of},
};
use crate::{CommandResult, Context};

const NO_ARTIST: &str = "You did not provide an artist link or URI.";

/// Follow artists or browse their albums
#[poise::command(slash_command, subcommands("follow", "albums"), subcommand_required)]
pub async fn artist(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// Follow artists by link
#[poise::command(slash_command)]
async fn follow(
    ctx: Context<'_>,
    #[description = "Spotify artist links"] artists: String,
) -> CommandResult {
    let ids = ids_of(&find_uris(&artists), UriKind::Artist);
    if ids.is_empty() {
        return Err(NO_ARTIST.into());
    }
    let token = access_token(ctx).await?;
    ctx.data().spotify.follow_artists(&token, &ids).await?;
    ctx.say(format!("Now following {} artists.", ids.len()))
        .await?;
    Ok(())
}

/// Browse an artist's albums
#[poise::command(slash_command)]
async fn albums(
    ctx: Context<'_>,
    #[description = "A Spotify artist link"] artist: String,
    #[description = "Show one album per page"] detailed: Option<bool>,
) -> CommandResult {
    let artist_id = ids_of(&find_uris(&artist), UriKind::Artist)
        .into_iter()
        .next()
        .ok_or(NO_ARTIST)?;
    let token = access_token(ctx).await?;
    let albums = ctx.data().spotify.artist_albums(&token, &artist_id).await?;
    if albums.items.is_empty() {
        ctx.say("That artist doesn't have any albums.").await?;
        return Ok(());
    }
    let pages = build_pages(
        &albums.items,
        "Albums",
        detailed.unwrap_or(true),
        album_embed,
        |a| link_line(&a.name, &a.external_urls),
        |a| a.uri.clone(),
    );
    paginate(ctx, pages).await
}
