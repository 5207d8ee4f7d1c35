use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::{CreateEmbed, CreateEmbedAuthor, CreateEmbedFooter};

use super::models::{
    Artist, CurrentPlayback, Device, Episode, ExternalUrls, Image, PlayingItem, PrivateUser, Show,
    SimpleAlbum, SimplePlaylist, Track,
};
use super::uri::ReactionAction;
use crate::utils::format_duration;

/// Spotify green.
pub const SPOTIFY_COLOUR: u32 = 0x1DB954;

/// Lines listed on one page of a compact listing.
pub const LINES_PER_PAGE: usize = 10;

/// Create a progress bar for the current item
fn format_progress_bar(position_ms: u64, total_ms: u64) -> String {
    const BAR_LENGTH: usize = 15;
    let progress = if total_ms == 0 {
        0.0
    } else {
        (position_ms as f64 / total_ms as f64).min(1.0)
    };

    let filled = (progress * BAR_LENGTH as f64).round() as usize;
    let empty = BAR_LENGTH - filled;

    format!("▬{}🔘{}▬", "▬".repeat(filled), "▬".repeat(empty))
}

fn first_image(images: &[Image]) -> Option<String> {
    images.first().map(|image| image.url.clone())
}

fn base_embed(title: &str, url: Option<&str>, images: &[Image]) -> CreateEmbed {
    let mut embed = CreateEmbed::new().title(title).color(SPOTIFY_COLOUR);
    if let Some(url) = url {
        embed = embed.url(url);
    }
    if let Some(image) = first_image(images) {
        embed = embed.thumbnail(image);
    }
    embed
}

/// `[Name](link)` for each artist.
fn artist_links(track: &Track) -> String {
    track
        .artists
        .iter()
        .map(|artist| match &artist.external_urls.spotify {
            Some(url) => format!("[{}]({})", artist.name, url),
            None => artist.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One-line summary of a track, used in compact listings and reaction searches.
pub fn track_line(track: &Track) -> String {
    match &track.external_urls.spotify {
        Some(url) => format!("[{}]({}) by {}", track.name, url, track.artist_names()),
        None => format!("{} by {}", track.name, track.artist_names()),
    }
}

/// `[Name](link)` when Spotify gave a link, the bare name otherwise.
pub fn link_line(name: &str, urls: &ExternalUrls) -> String {
    match &urls.spotify {
        Some(url) => format!("[{}]({})", name, url),
        None => name.to_string(),
    }
}

pub fn track_embed(track: &Track) -> CreateEmbed {
    let images = track.album.as_ref().map(|a| a.images.as_slice()).unwrap_or(&[]);
    let mut description = format!("by {}", artist_links(track));
    if let Some(album) = &track.album {
        description.push_str(&format!("\non **{}**", album.name));
    }
    base_embed(&track.name, track.external_urls.spotify.as_deref(), images)
        .description(description)
        .footer(CreateEmbedFooter::new(format!(
            "Duration: {}",
            format_duration(track.duration_ms)
        )))
}

pub fn artist_embed(artist: &Artist) -> CreateEmbed {
    let mut embed = base_embed(&artist.name, artist.external_urls.spotify.as_deref(), &artist.images);
    if !artist.genres.is_empty() {
        embed = embed.field("Genres", artist.genres.join(", "), false);
    }
    if let Some(followers) = &artist.followers {
        embed = embed.field("Followers", followers.total.to_string(), true);
    }
    embed
}

pub fn album_embed(album: &SimpleAlbum) -> CreateEmbed {
    let artists = album
        .artists
        .iter()
        .map(|a| a.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut embed = base_embed(&album.name, album.external_urls.spotify.as_deref(), &album.images)
        .description(format!("by {}", artists));
    if let Some(date) = &album.release_date {
        embed = embed.field("Released", date, true);
    }
    if let Some(total) = album.total_tracks {
        embed = embed.field("Tracks", total.to_string(), true);
    }
    embed
}

pub fn playlist_embed(playlist: &SimplePlaylist) -> CreateEmbed {
    let owner = playlist
        .owner
        .as_ref()
        .and_then(|o| o.display_name.clone().or_else(|| Some(o.id.clone())))
        .unwrap_or_else(|| "Unknown".to_string());
    let mut embed = base_embed(
        &playlist.name,
        playlist.external_urls.spotify.as_deref(),
        &playlist.images,
    )
    .field("Owner", owner, true)
    .field("Tracks", playlist.tracks.total.to_string(), true);
    if let Some(description) = playlist.description.as_deref().filter(|d| !d.is_empty()) {
        embed = embed.description(description);
    }
    embed
}

pub fn show_embed(show: &Show) -> CreateEmbed {
    let mut embed = base_embed(&show.name, show.external_urls.spotify.as_deref(), &show.images);
    if let Some(publisher) = &show.publisher {
        embed = embed.field("Publisher", publisher, true);
    }
    if let Some(description) = &show.description {
        embed = embed.description(truncate(description, 1024));
    }
    embed
}

pub fn episode_embed(episode: &Episode) -> CreateEmbed {
    let mut embed = base_embed(
        &episode.name,
        episode.external_urls.spotify.as_deref(),
        &episode.images,
    )
    .footer(CreateEmbedFooter::new(format!(
        "Duration: {}",
        format_duration(episode.duration_ms)
    )));
    if let Some(show) = &episode.show {
        embed = embed.field("Show", &show.name, true);
    }
    if let Some(description) = &episode.description {
        embed = embed.description(truncate(description, 1024));
    }
    embed
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max - 1).collect();
    out.push('…');
    out
}

/// Embed for what the user is listening to right now.
pub fn now_playing(playback: &CurrentPlayback, detailed: bool) -> CreateEmbed {
    let mut embed = match &playback.item {
        Some(PlayingItem::Track(track)) => track_embed(track),
        Some(PlayingItem::Episode(episode)) => episode_embed(episode),
        None => CreateEmbed::new().title("Nothing playing").color(SPOTIFY_COLOUR),
    };
    embed = embed.author(serenity::CreateEmbedAuthor::new(if playback.is_playing {
        "Now Playing"
    } else {
        "Paused"
    }));

    if let Some(item) = &playback.item {
        let progress = playback.progress_ms.unwrap_or(0);
        embed = embed.field(
            "Progress",
            format!(
                "{}\n`{} / {}`",
                format_progress_bar(progress, item.duration_ms()),
                format_duration(progress),
                format_duration(item.duration_ms())
            ),
            false,
        );
    }

    if detailed {
        if let Some(device) = &playback.device {
            embed = embed.field("Device", device_line(device), true);
        }
        embed = embed
            .field("Shuffle", if playback.shuffle_state { "On" } else { "Off" }, true)
            .field("Repeat", &playback.repeat_state, true);
        if let Some(context) = &playback.context {
            embed = embed.field("Context", &context.uri, false);
        }
    }
    embed
}

pub fn device_line(device: &Device) -> String {
    match device.volume_percent {
        Some(volume) => format!("{} ({}, {}%)", device.name, device.kind, volume),
        None => format!("{} ({})", device.name, device.kind),
    }
}

/// Settings summary for `/spotify me`. The Spotify name only appears in DMs or with
/// `show_private` set.
pub fn profile_description(
    listen_for: &[ReactionAction],
    show_private: bool,
    user: Option<&PrivateUser>,
    in_dm: bool,
) -> String {
    let emojis = if listen_for.is_empty() {
        "Nothing".to_string()
    } else {
        listen_for
            .iter()
            .map(|action| action.emoji())
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut description = format!(
        "Watching for Emojis: {}\nShow Private Playlists: {}\n",
        emojis, show_private
    );
    if let Some(user) = user.filter(|_| show_private || in_dm) {
        description.push_str(&format!(
            "Spotify Name: [{}](https://open.spotify.com/user/{})\nSubscription: {}\n",
            user.display_name.as_deref().unwrap_or(&user.id),
            user.id,
            user.product.as_deref().unwrap_or("unknown")
        ));
    }
    description
}

/// Account details that are only ever sent in DMs.
pub fn private_data(user: &PrivateUser) -> String {
    format!(
        "Country: {}\nSpotify ID: {}\nEmail: {}\n",
        user.country.as_deref().unwrap_or("unknown"),
        user.id,
        user.email.as_deref().unwrap_or("unknown")
    )
}

/// Profile card for `/spotify me`. `user` is `None` when no account is linked.
pub fn profile_embed(
    author: &serenity::User,
    listen_for: &[ReactionAction],
    show_private: bool,
    user: Option<&PrivateUser>,
    in_dm: bool,
) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .color(SPOTIFY_COLOUR)
        .author(
            CreateEmbedAuthor::new(format!("{} Spotify Profile", author.display_name()))
                .icon_url(author.face()),
        )
        .description(profile_description(listen_for, show_private, user, in_dm));
    if in_dm {
        if let Some(user) = user {
            embed = embed.field("Private Data", private_data(user), false);
        }
    }
    embed
}

/// Splits a long listing into numbered embed pages.
pub fn list_embeds(title: &str, lines: &[String]) -> Vec<CreateEmbed> {
    let total = lines.len().div_ceil(LINES_PER_PAGE);
    lines
        .chunks(LINES_PER_PAGE)
        .enumerate()
        .map(|(page, chunk)| {
            let description = chunk
                .iter()
                .enumerate()
                .map(|(i, line)| format!("{}. {}", page * LINES_PER_PAGE + i + 1, line))
                .collect::<Vec<_>>()
                .join("\n");
            CreateEmbed::new()
                .title(title)
                .description(description)
                .color(SPOTIFY_COLOUR)
                .footer(CreateEmbedFooter::new(format!("Page {}/{}", page + 1, total)))
        })
        .collect()
}

/// Ephemeral reply for a failed Spotify action
pub fn spotify_error(message: &str) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .description(format!("❌ {}", message))
                .color(0xff0000),
        )
        .ephemeral(true)
}
