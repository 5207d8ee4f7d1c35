use poise::serenity_prelude::{self as serenity, Message, Reaction};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, error, info, warn};

use super::{
    auth::stored_access_token,
    models::SearchResults,
    spotify_api::{SpotifyClient, SpotifyError, SpotifyResult},
    uri::{ReactionAction, SearchType, SpotifyUri, UriKind, find_uris, ids_of},
};
use crate::{Data, Error};

/// `[Title](link)` style names in embeds, used when a message has no Spotify link.
static BRACKETED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.+?)\]").unwrap());

/// Plays what the links point at. Tracks and episodes are queued up together; otherwise the
/// first album, playlist, artist or show is played. Returns whether anything was started.
pub async fn play_uris(
    client: &SpotifyClient,
    token: &str,
    uris: &[SpotifyUri],
) -> SpotifyResult<bool> {
    let tracks: Vec<String> = uris
        .iter()
        .filter(|uri| matches!(uri.kind, UriKind::Track | UriKind::Episode))
        .map(SpotifyUri::to_string)
        .collect();
    if !tracks.is_empty() {
        client.start_tracks(token, &tracks).await?;
        return Ok(true);
    }

    match uris.iter().find(|uri| {
        matches!(
            uri.kind,
            UriKind::Album | UriKind::Playlist | UriKind::Artist | UriKind::Show
        )
    }) {
        Some(context) => {
            client
                .start_context(token, &context.to_string(), None)
                .await?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Saves tracks and albums to the library and follows playlists. Other links are ignored.
/// Returns how many links were acted on.
pub async fn like_uris(
    client: &SpotifyClient,
    token: &str,
    uris: &[SpotifyUri],
) -> SpotifyResult<usize> {
    let tracks = ids_of(uris, UriKind::Track);
    let albums = ids_of(uris, UriKind::Album);
    let playlists = ids_of(uris, UriKind::Playlist);

    if !tracks.is_empty() {
        client.save_tracks(token, &tracks).await?;
    }
    if !albums.is_empty() {
        client.save_albums(token, &albums).await?;
    }
    for playlist in &playlists {
        client.follow_playlist(token, playlist, true).await?;
    }
    Ok(tracks.len() + albums.len() + playlists.len())
}

/// All text in a message that may carry Spotify links.
pub fn message_text(message: &Message) -> String {
    let mut text = message.content.clone();
    for embed in &message.embeds {
        for part in [&embed.title, &embed.url, &embed.description]
            .into_iter()
            .flatten()
        {
            text.push('\n');
            text.push_str(part);
        }
        for field in &embed.fields {
            text.push('\n');
            text.push_str(&field.value);
        }
    }
    text
}

/// A search query for messages without links: the first embed title, or the first bracketed
/// name in its description.
pub fn fallback_query(message: &Message) -> Option<String> {
    let embed = message.embeds.first()?;
    if let Some(title) = embed.title.as_deref().filter(|t| !t.trim().is_empty()) {
        return Some(title.to_string());
    }
    let description = embed.description.as_deref()?;
    BRACKETED_RE
        .captures(description)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Every track found by a search, in result order.
pub fn search_track_uris(results: &SearchResults) -> Vec<SpotifyUri> {
    results
        .tracks
        .as_ref()
        .map(|tracks| {
            tracks
                .items
                .iter()
                .filter_map(|track| SpotifyUri::parse(&track.uri))
                .collect()
        })
        .unwrap_or_default()
}

/// Acts on ⏯️ and ❤️ reactions for users who opted in with `/spotify set listen`.
pub async fn handle_reaction(
    ctx: &serenity::Context,
    reaction: &Reaction,
    data: &Data,
) -> Result<(), Error> {
    let Some(action) = ReactionAction::from_emoji(&reaction.emoji.to_string()) else {
        return Ok(());
    };
    let Some(user_id) = reaction.user_id else {
        return Ok(());
    };
    if user_id == ctx.cache.current_user().id
        || reaction.member.as_ref().is_some_and(|m| m.user.bot)
    {
        return Ok(());
    }

    let settings = data.db.get_spotify_user(user_id.get())?;
    if !settings.listen_for.contains(&action) {
        return Ok(());
    }

    let token = match stored_access_token(data, user_id.get()).await {
        Ok(token) => token,
        Err(e) => {
            debug!("Ignoring {} reaction from {}: {}", action, user_id, e);
            return Ok(());
        }
    };

    let message = reaction.message(ctx).await?;
    let uris = find_uris(&message_text(&message));

    let outcome = match action {
        ReactionAction::Play => play_from_message(&data.spotify, &token, &message, &uris).await,
        ReactionAction::Like => like_uris(&data.spotify, &token, &uris).await.map(|n| n > 0),
    };

    match outcome {
        Ok(true) => info!("Handled {} reaction for {} on {}", action, user_id, message.id),
        Ok(false) => debug!("Nothing to {} on message {}", action, message.id),
        Err(e) if e.is_unexpected() => {
            error!("Spotify {} reaction for {} failed: {}", action, user_id, e)
        }
        Err(e) => warn!("Spotify {} reaction for {} failed: {}", action, user_id, e),
    }
    Ok(())
}

async fn play_from_message(
    client: &SpotifyClient,
    token: &str,
    message: &Message,
    uris: &[SpotifyUri],
) -> Result<bool, SpotifyError> {
    if !uris.is_empty() {
        return play_uris(client, token, uris).await;
    }
    let Some(query) = fallback_query(message) else {
        return Ok(false);
    };
    let results = client.search(token, &query, SearchType::Track).await?;
    let found = search_track_uris(&results);
    if found.is_empty() {
        return Ok(false);
    }
    play_uris(client, token, &found).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(content: &str, embeds: serde_json::Value) -> Message {
        serde_json::from_value(json!({
            "id": "1",
            "channel_id": "2",
            "author": {
                "id": "3",
                "username": "someone",
                "discriminator": "0000",
                "avatar": null
            },
            "content": content,
            "timestamp": "2024-01-01T00:00:00.000000+00:00",
            "edited_timestamp": null,
            "tts": false,
            "mention_everyone": false,
            "mentions": [],
            "mention_roles": [],
            "attachments": [],
            "embeds": embeds,
            "pinned": false,
            "type": 0
        }))
        .unwrap()
    }

    #[test]
    fn test_message_text_includes_embeds() {
        let message = message(
            "listen to this",
            json!([{
                "title": "Song",
                "url": "https://open.spotify.com/track/abc",
                "fields": [{"name": "Album", "value": "spotify:album:def", "inline": false}]
            }]),
        );
        let uris = find_uris(&message_text(&message));
        assert_eq!(
            uris,
            vec![
                SpotifyUri::new(UriKind::Track, "abc"),
                SpotifyUri::new(UriKind::Album, "def"),
            ]
        );
    }

    #[test]
    fn test_search_fallback_keeps_every_track() {
        let results: SearchResults = serde_json::from_value(json!({
            "tracks": {
                "items": [
                    {"id": "t1", "name": "One", "uri": "spotify:track:t1"},
                    {"id": "t2", "name": "Two", "uri": "spotify:track:t2"},
                    {"id": "t3", "name": "Three", "uri": "spotify:track:t3"}
                ],
                "total": 3
            }
        }))
        .unwrap();
        assert_eq!(
            search_track_uris(&results),
            vec![
                SpotifyUri::new(UriKind::Track, "t1"),
                SpotifyUri::new(UriKind::Track, "t2"),
                SpotifyUri::new(UriKind::Track, "t3"),
            ]
        );
        assert!(search_track_uris(&SearchResults::default()).is_empty());
    }

    #[test]
    fn test_fallback_query_prefers_title() {
        let titled = message("", json!([{"title": "Bohemian Rhapsody"}]));
        assert_eq!(fallback_query(&titled).as_deref(), Some("Bohemian Rhapsody"));

        let bracketed = message("", json!([{"description": "Now playing [Song Name](http://x)"}]));
        assert_eq!(fallback_query(&bracketed).as_deref(), Some("Song Name"));

        assert_eq!(fallback_query(&message("plain", json!([]))), None);
    }
}
