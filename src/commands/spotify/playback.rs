use tracing::debug;

use super::access_token;
use super::utils::{
    embedded_messages::{device_line, now_playing},
    models::{CurrentPlayback, Device, SavedTrack, SimplePlaylist},
    pagination::{Page, paginate},
    reaction_handlers::play_uris,
    uri::{RepeatState, SearchType, SpotifyUri, UriKind, find_uris},
};
use crate::{CommandResult, Context, Error};

const NOT_LISTENING: &str = "It appears you're not currently listening to Spotify.";

/// The playback state, or an error telling the user nothing is playing.
async fn require_playback(ctx: Context<'_>, token: &str) -> Result<CurrentPlayback, Error> {
    ctx.data()
        .spotify
        .current_playback(token)
        .await?
        .filter(|playback| playback.item.is_some())
        .ok_or_else(|| NOT_LISTENING.into())
}

/// Picks the followed playlist best matching `query`: an exact name first, then one whose
/// name starts with it, then one containing it.
pub fn best_playlist_match<'a>(playlists: &'a [SimplePlaylist], query: &str) -> Option<&'a SimplePlaylist> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }
    let names: Vec<String> = playlists.iter().map(|p| p.name.to_lowercase()).collect();
    let find = |pred: &dyn Fn(&str) -> bool| {
        names
            .iter()
            .position(|name| pred(name.as_str()))
            .map(|i| &playlists[i])
    };
    find(&|name| name == query)
        .or_else(|| find(&|name| name.starts_with(&query)))
        .or_else(|| find(&|name| name.contains(&query)))
}

/// Saved tracks whose name contains `query`.
pub fn matching_saved_tracks(saved: &[SavedTrack], query: &str) -> Vec<String> {
    let query = query.trim().to_lowercase();
    saved
        .iter()
        .filter(|saved| saved.track.name.to_lowercase().contains(&query))
        .map(|saved| saved.track.uri.clone())
        .filter(|uri| !uri.is_empty())
        .collect()
}

/// Finds a device by name, ignoring case.
pub fn find_device<'a>(devices: &'a [Device], name: &str) -> Option<&'a Device> {
    let name = name.trim().to_lowercase();
    devices
        .iter()
        .find(|d| d.name.to_lowercase() == name)
        .or_else(|| devices.iter().find(|d| d.name.to_lowercase().contains(&name)))
}

/// New position for a relative seek, kept within the current item.
pub fn seek_target(progress_ms: u64, duration_ms: u64, seconds: i64) -> u64 {
    let target = progress_ms as i64 + seconds.saturating_mul(1000);
    (target.max(0) as u64).min(duration_ms)
}

/// Show what you're listening to
#[poise::command(slash_command)]
pub async fn now(
    ctx: Context<'_>,
    #[description = "Show the device, shuffle and repeat state too"] detailed: Option<bool>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let playback = require_playback(ctx, &token).await?;
    let page = Page {
        embed: now_playing(&playback, detailed.unwrap_or(false)),
        uri: playback
            .item
            .as_ref()
            .and_then(|item| SpotifyUri::parse(item.uri())),
    };
    paginate(ctx, vec![page]).await
}

/// Pause playback
#[poise::command(slash_command)]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let token = access_token(ctx).await?;
    ctx.data().spotify.pause(&token).await?;
    ctx.say("⏸️ Paused.").await?;
    Ok(())
}

/// Resume playback
#[poise::command(slash_command)]
pub async fn resume(ctx: Context<'_>) -> CommandResult {
    let token = access_token(ctx).await?;
    let client = &ctx.data().spotify;
    if let Some(playback) = client.current_playback(&token).await? {
        if playback.is_playing {
            ctx.say("You are already playing music on Spotify.").await?;
            return Ok(());
        }
    }
    client.resume(&token).await?;
    ctx.say("▶️ Resumed.").await?;
    Ok(())
}

/// Skip to the next track
#[poise::command(slash_command)]
pub async fn next(ctx: Context<'_>) -> CommandResult {
    let token = access_token(ctx).await?;
    ctx.data().spotify.next_track(&token).await?;
    ctx.say("⏭️ Skipped to the next track.").await?;
    Ok(())
}

/// Go back to the previous track
#[poise::command(slash_command)]
pub async fn previous(ctx: Context<'_>) -> CommandResult {
    let token = access_token(ctx).await?;
    ctx.data().spotify.previous_track(&token).await?;
    ctx.say("⏮️ Back to the previous track.").await?;
    Ok(())
}

/// Play links, one of your playlists by name, or your saved tracks
#[poise::command(slash_command)]
pub async fn play(
    ctx: Context<'_>,
    #[description = "Spotify links or the name of one of your playlists"] url_or_playlist_name: Option<String>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let client = &ctx.data().spotify;

    let Some(query) = url_or_playlist_name.filter(|q| !q.trim().is_empty()) else {
        let saved = client.saved_tracks(&token).await?;
        let uris: Vec<String> = saved.items.iter().map(|s| s.track.uri.clone()).collect();
        if uris.is_empty() {
            return Err("I could not find any URL's or matching playlist names.".into());
        }
        client.start_tracks(&token, &uris).await?;
        ctx.say("▶️ Playing your saved tracks.").await?;
        return Ok(());
    };

    let uris = find_uris(&query);
    if !uris.is_empty() {
        if play_uris(client, &token, &uris).await? {
            ctx.say("▶️ Now playing.").await?;
            return Ok(());
        }
        return Err("I could not find any URL's or matching playlist names.".into());
    }

    let playlists = client.all_followed_playlists(&token).await?;
    if let Some(playlist) = best_playlist_match(&playlists, &query) {
        debug!("Matched `{}` to playlist {}", query, playlist.id);
        client.start_context(&token, &playlist.uri, None).await?;
        ctx.say(format!("▶️ Playing **{}**.", playlist.name)).await?;
        return Ok(());
    }

    let saved = client.saved_tracks(&token).await?;
    let tracks = matching_saved_tracks(&saved.items, &query);
    if tracks.is_empty() {
        return Err("I could not find any URL's or matching playlist names.".into());
    }
    client.start_tracks(&token, &tracks).await?;
    ctx.say("▶️ Now playing.").await?;
    Ok(())
}

/// Add a track to the queue
#[poise::command(slash_command)]
pub async fn queue(
    ctx: Context<'_>,
    #[description = "A Spotify track link or a search query"] song: String,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let client = &ctx.data().spotify;

    let uris: Vec<SpotifyUri> = find_uris(&song)
        .into_iter()
        .filter(|uri| matches!(uri.kind, UriKind::Track | UriKind::Episode))
        .collect();
    let uri = match uris.as_slice() {
        [uri] => uri.to_string(),
        [] => {
            let results = client.search(&token, &song, SearchType::Track).await?;
            results
                .tracks
                .and_then(|page| page.items.into_iter().next())
                .map(|track| track.uri)
                .ok_or("No track could be found matching that query.")?
        }
        _ => return Err("I can only append 1 track at a time right now to the queue.".into()),
    };

    client.add_to_queue(&token, &uri).await?;
    ctx.say("⏭️ Added to your queue.").await?;
    Ok(())
}

/// Set the repeat mode, or cycle it when no mode is given
#[poise::command(slash_command)]
pub async fn repeat(
    ctx: Context<'_>,
    #[description = "off, track or context"] state: Option<RepeatState>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let state = match state {
        Some(state) => state,
        None => RepeatState::next(&require_playback(ctx, &token).await?.repeat_state),
    };
    ctx.data().spotify.set_repeat(&token, state.as_str()).await?;
    let emoji = match state {
        RepeatState::Off => "❎",
        RepeatState::Track => "🔂",
        RepeatState::Context => "🔁",
    };
    ctx.say(format!("{} Repeat is now `{}`.", emoji, state.as_str()))
        .await?;
    Ok(())
}

/// Turn shuffle on or off, or toggle it
#[poise::command(slash_command)]
pub async fn shuffle(
    ctx: Context<'_>,
    #[description = "Leave empty to toggle"] state: Option<bool>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let state = match state {
        Some(state) => state,
        None => !require_playback(ctx, &token).await?.shuffle_state,
    };
    ctx.data().spotify.set_shuffle(&token, state).await?;
    ctx.say(if state {
        "🔀 Shuffle is on."
    } else {
        "➡️ Shuffle is off."
    })
    .await?;
    Ok(())
}

/// Seek forward, or backward with a negative number
#[poise::command(slash_command)]
pub async fn seek(
    ctx: Context<'_>,
    #[description = "Seconds to move forward or backward"] seconds: i64,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let playback = require_playback(ctx, &token).await?;
    let duration = playback.item.as_ref().map(|i| i.duration_ms()).unwrap_or(0);
    let target = seek_target(playback.progress_ms.unwrap_or(0), duration, seconds);
    ctx.data().spotify.seek(&token, target).await?;
    ctx.say(if seconds < 0 { "⏪ Seeked." } else { "⏩ Seeked." })
        .await?;
    Ok(())
}

/// Set the playback volume
#[poise::command(slash_command)]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume between 0 and 100"]
    #[min = 0]
    #[max = 100]
    volume: i64,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let volume = volume.clamp(0, 100) as u8;
    ctx.data().spotify.set_volume(&token, volume).await?;
    let emoji = match volume {
        0 => "🔇",
        1..=33 => "🔈",
        34..=66 => "🔉",
        _ => "🔊",
    };
    ctx.say(format!("{} Volume set to {}%.", emoji, volume))
        .await?;
    Ok(())
}

/// Move playback to another device, or list your devices
#[poise::command(slash_command)]
pub async fn device(
    ctx: Context<'_>,
    #[description = "Name of the device, leave empty to list them"] name: Option<String>,
) -> CommandResult {
    let token = access_token(ctx).await?;
    let client = &ctx.data().spotify;
    let devices = client.devices(&token).await?.devices;

    let Some(name) = name else {
        if devices.is_empty() {
            return Err("I could not find an active device to send requests for.".into());
        }
        let list = devices
            .iter()
            .map(|d| {
                let active = if d.is_active { " (active)" } else { "" };
                format!("- {}{}", device_line(d), active)
            })
            .collect::<Vec<_>>()
            .join("\n");
        ctx.say(format!("Your devices:\n{}", list)).await?;
        return Ok(());
    };

    let device = find_device(&devices, &name)
        .ok_or_else(|| format!("I could not find a device named `{}`.", name))?;
    let device_id = device
        .id
        .as_deref()
        .ok_or("That device can't be controlled remotely.")?;
    let is_playing = client
        .current_playback(&token)
        .await?
        .is_some_and(|p| p.is_playing);
    client
        .transfer_playback(&token, device_id, is_playing)
        .await?;
    ctx.say(format!("🔀 Moved playback to **{}**.", device.name))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    fn playlists(names: &[&str]) -> Vec<SimplePlaylist> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                serde_json::from_value(json!({
                    "id": format!("p{}", i),
                    "name": name,
                    "uri": format!("spotify:playlist:p{}", i)
                }))
                .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_best_playlist_match_prefers_exact_names() {
        let lists = playlists(&["Chill Mix", "Chill", "Late Night Chill"]);
        assert_eq!(best_playlist_match(&lists, "chill").unwrap().id, "p1");
        assert_eq!(best_playlist_match(&lists, "late").unwrap().id, "p2");
        assert_eq!(best_playlist_match(&lists, "night").unwrap().id, "p2");
        assert!(best_playlist_match(&lists, "metal").is_none());
        assert!(best_playlist_match(&lists, "  ").is_none());
    }

    #[test_case(10_000, 60_000, 5, 15_000)]
    #[test_case(10_000, 60_000, -30, 0)]
    #[test_case(10_000, 60_000, 120, 60_000)]
    fn test_seek_target_is_clamped(progress: u64, duration: u64, seconds: i64, expected: u64) {
        assert_eq!(seek_target(progress, duration, seconds), expected);
    }

    #[test]
    fn test_find_device_by_name() {
        let devices: Vec<Device> = serde_json::from_value(json!([
            {"id": "d1", "name": "Kitchen Speaker", "type": "Speaker"},
            {"id": "d2", "name": "Laptop", "type": "Computer"}
        ]))
        .unwrap();
        assert_eq!(find_device(&devices, "laptop").unwrap().id.as_deref(), Some("d2"));
        assert_eq!(find_device(&devices, "kitchen").unwrap().id.as_deref(), Some("d1"));
        assert!(find_device(&devices, "phone").is_none());
    }
}
