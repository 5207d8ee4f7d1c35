//! Spotify links and URIs, reaction actions and the small enums commands take as arguments.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

/// Matches `https://open.spotify.com/<kind>/<id>` links and `spotify:<kind>:<id>` URIs.
pub static SPOTIFY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(https?://open\.spotify\.com/(?:intl-[a-zA-Z-]+/)?|spotify:)(track|playlist|album|artist|episode|show)[/:]([a-zA-Z0-9]+)",
    )
    .unwrap()
});

/// The kinds of object a Spotify link can point at.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UriKind {
    Track,
    Playlist,
    Album,
    Artist,
    Episode,
    Show,
}

impl UriKind {
    pub fn as_str(self) -> &'static str {
        match self {
            UriKind::Track => "track",
            UriKind::Playlist => "playlist",
            UriKind::Album => "album",
            UriKind::Artist => "artist",
            UriKind::Episode => "episode",
            UriKind::Show => "show",
        }
    }
}

impl FromStr for UriKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "track" => Ok(UriKind::Track),
            "playlist" => Ok(UriKind::Playlist),
            "album" => Ok(UriKind::Album),
            "artist" => Ok(UriKind::Artist),
            "episode" => Ok(UriKind::Episode),
            "show" => Ok(UriKind::Show),
            _ => Err(()),
        }
    }
}

/// A parsed Spotify link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpotifyUri {
    pub kind: UriKind,
    pub id: String,
}

impl SpotifyUri {
    pub fn new(kind: UriKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Parses a `spotify:<kind>:<id>` URI as returned by the Web API.
    pub fn parse(uri: &str) -> Option<Self> {
        find_uris(uri).into_iter().next()
    }
}

impl fmt::Display for SpotifyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spotify:{}:{}", self.kind.as_str(), self.id)
    }
}

/// Every Spotify link or URI in `text`, in order of appearance.
pub fn find_uris(text: &str) -> Vec<SpotifyUri> {
    SPOTIFY_RE
        .captures_iter(text)
        .filter_map(|caps| {
            let kind = caps.get(2)?.as_str().parse().ok()?;
            Some(SpotifyUri::new(kind, caps.get(3)?.as_str()))
        })
        .collect()
}

/// IDs of every link of `kind` in `text`.
pub fn ids_of(uris: &[SpotifyUri], kind: UriKind) -> Vec<String> {
    uris.iter()
        .filter(|uri| uri.kind == kind)
        .map(|uri| uri.id.clone())
        .collect()
}

pub const PLAY_EMOJI: &str = "⏯️";
pub const LIKE_EMOJI: &str = "❤️";

/// What a reaction on a message asks the bot to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionAction {
    Play,
    Like,
}

impl ReactionAction {
    pub fn emoji(self) -> &'static str {
        match self {
            ReactionAction::Play => PLAY_EMOJI,
            ReactionAction::Like => LIKE_EMOJI,
        }
    }

    /// Matches with or without the trailing variation selector, clients send both.
    pub fn from_emoji(emoji: &str) -> Option<Self> {
        let bare = |e: &str| e.trim_end_matches('\u{fe0f}').to_string();
        let emoji = bare(emoji);
        [ReactionAction::Play, ReactionAction::Like]
            .into_iter()
            .find(|action| bare(action.emoji()) == emoji)
    }

    fn label(self) -> &'static str {
        match self {
            ReactionAction::Play => "play",
            ReactionAction::Like => "like",
        }
    }
}

impl FromStr for ReactionAction {
    type Err = ();

    /// Accepts the action name or its emoji.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "play" => Ok(ReactionAction::Play),
            "like" => Ok(ReactionAction::Like),
            other => ReactionAction::from_emoji(other).ok_or(()),
        }
    }
}

/// Parses a space or comma separated list of actions, skipping anything unknown.
pub fn parse_actions(input: &str) -> Vec<ReactionAction> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter_map(|word| word.parse().ok())
        .collect()
}

impl fmt::Display for ReactionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of toggling reaction listeners.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListenToggle {
    pub listen_for: Vec<ReactionAction>,
    pub added: Vec<ReactionAction>,
    pub removed: Vec<ReactionAction>,
}

/// Toggles each requested action: ones already listened for are removed, others are added.
pub fn toggle_listen(current: &[ReactionAction], requested: &[ReactionAction]) -> ListenToggle {
    let mut toggle = ListenToggle {
        listen_for: current.to_vec(),
        ..Default::default()
    };
    for action in requested {
        if toggle.added.contains(action) || toggle.removed.contains(action) {
            continue;
        }
        if let Some(pos) = toggle.listen_for.iter().position(|a| a == action) {
            toggle.listen_for.remove(pos);
            toggle.removed.push(*action);
        } else {
            toggle.listen_for.push(*action);
            toggle.added.push(*action);
        }
    }
    toggle
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, poise::ChoiceParameter)]
pub enum SearchType {
    #[name = "track"]
    Track,
    #[name = "artist"]
    Artist,
    #[name = "album"]
    Album,
    #[name = "playlist"]
    Playlist,
    #[name = "show"]
    Show,
    #[name = "episode"]
    Episode,
}

impl SearchType {
    /// The `type` query parameter of the search endpoint.
    pub fn as_str(self) -> &'static str {
        match self {
            SearchType::Track => "track",
            SearchType::Artist => "artist",
            SearchType::Album => "album",
            SearchType::Playlist => "playlist",
            SearchType::Show => "show",
            SearchType::Episode => "episode",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, poise::ChoiceParameter)]
pub enum RepeatState {
    #[name = "off"]
    Off,
    #[name = "track"]
    Track,
    #[name = "context"]
    Context,
}

impl RepeatState {
    pub fn as_str(self) -> &'static str {
        match self {
            RepeatState::Off => "off",
            RepeatState::Track => "track",
            RepeatState::Context => "context",
        }
    }

    /// Cycles off, track, context, off.
    pub fn next(current: &str) -> Self {
        match current {
            "off" => RepeatState::Track,
            "track" => RepeatState::Context,
            _ => RepeatState::Off,
        }
    }
}

/// Tunable attributes given as 0-100 percentages, sent to the API as 0.0-1.0.
const PERCENT_ATTRIBUTES: &[&str] = &[
    "acousticness",
    "danceability",
    "energy",
    "instrumentalness",
    "liveness",
    "speechiness",
    "valence",
];

/// Turns free text like `genre:rock energy:80 https://open.spotify.com/track/...` into
/// query parameters for the recommendations endpoint.
pub fn parse_recommendations(input: &str) -> Result<Vec<(String, String)>, String> {
    let uris = find_uris(input);
    let seed_tracks = ids_of(&uris, UriKind::Track);
    let seed_artists = ids_of(&uris, UriKind::Artist);
    let mut seed_genres: Vec<String> = Vec::new();
    let mut params: Vec<(String, String)> = Vec::new();

    let without_links = SPOTIFY_RE.replace_all(input, " ");
    for token in without_links.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        let Some((key, value)) = token.split_once([':', '=']) else {
            continue;
        };
        let key = key.trim().to_lowercase();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        let invalid = || format!("`{}` is not a valid value for `{}`.", value, key);
        match key.as_str() {
            "genre" | "genres" => seed_genres.push(value.to_lowercase()),
            k if PERCENT_ATTRIBUTES.contains(&k) => {
                let v: f64 = value.parse().map_err(|_| invalid())?;
                if !(0.0..=100.0).contains(&v) {
                    return Err(format!("`{}` must be between 0 and 100.", key));
                }
                params.push((format!("target_{}", key), format!("{}", v / 100.0)));
            }
            "popularity" => {
                let v: u8 = value.parse().map_err(|_| invalid())?;
                params.push(("target_popularity".to_string(), v.min(100).to_string()));
            }
            "key" => {
                let v: u8 = value.parse().ok().filter(|k| *k <= 11).ok_or_else(invalid)?;
                params.push(("target_key".to_string(), v.to_string()));
            }
            "loudness" => {
                let v: f64 = value.parse().map_err(|_| invalid())?;
                params.push(("target_loudness".to_string(), v.clamp(-60.0, 0.0).to_string()));
            }
            "mode" => {
                let v = match value.to_lowercase().as_str() {
                    "major" | "1" => "1",
                    "minor" | "0" => "0",
                    _ => return Err(invalid()),
                };
                params.push(("target_mode".to_string(), v.to_string()));
            }
            "tempo" | "duration_ms" | "time_signature" => {
                let v: u32 = value.parse().map_err(|_| invalid())?;
                params.push((format!("target_{}", key), v.to_string()));
            }
            _ => {}
        }
    }

    if seed_tracks.is_empty() && seed_artists.is_empty() && seed_genres.is_empty() {
        return Err(
            "You must provide at least one genre, track link or artist link to seed recommendations."
                .to_string(),
        );
    }
    if seed_tracks.len() + seed_artists.len() + seed_genres.len() > 5 {
        return Err("You can provide at most 5 seeds in total.".to_string());
    }

    for (name, seeds) in [
        ("seed_tracks", seed_tracks),
        ("seed_artists", seed_artists),
        ("seed_genres", seed_genres),
    ] {
        if !seeds.is_empty() {
            params.push((name.to_string(), seeds.join(",")));
        }
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn test_find_uris_in_links_and_uris() {
        let text = "check https://open.spotify.com/track/abc123?si=x and spotify:album:XYZ \
                    plus https://open.spotify.com/intl-de/artist/art1";
        assert_eq!(
            find_uris(text),
            vec![
                SpotifyUri::new(UriKind::Track, "abc123"),
                SpotifyUri::new(UriKind::Album, "XYZ"),
                SpotifyUri::new(UriKind::Artist, "art1"),
            ]
        );
        assert_eq!(SpotifyUri::new(UriKind::Track, "abc").to_string(), "spotify:track:abc");
    }

    #[test]
    fn test_toggle_listen_twice_restores() {
        let first = toggle_listen(&[], &[ReactionAction::Play, ReactionAction::Like]);
        assert_eq!(first.added, vec![ReactionAction::Play, ReactionAction::Like]);
        let second = toggle_listen(&first.listen_for, &[ReactionAction::Like]);
        assert_eq!(second.listen_for, vec![ReactionAction::Play]);
        assert_eq!(second.removed, vec![ReactionAction::Like]);
    }

    #[test]
    fn test_reaction_action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&[ReactionAction::Play]).unwrap(),
            r#"["play"]"#
        );
        assert_eq!(ReactionAction::from_emoji("❤️"), Some(ReactionAction::Like));
        assert_eq!(ReactionAction::from_emoji("⏯"), Some(ReactionAction::Play));
        assert_eq!(ReactionAction::from_emoji("👍"), None);
    }

    #[test]
    fn test_parse_actions() {
        assert_eq!(
            parse_actions("Play, ❤️ dance"),
            vec![ReactionAction::Play, ReactionAction::Like]
        );
        assert!(parse_actions("").is_empty());
    }

    #[test_case("off", RepeatState::Track)]
    #[test_case("track", RepeatState::Context)]
    #[test_case("context", RepeatState::Off)]
    fn test_repeat_cycles(current: &str, expected: RepeatState) {
        assert_eq!(RepeatState::next(current), expected);
    }

    #[test]
    fn test_recommendation_params() {
        let params = parse_recommendations(
            "genre:rock energy:80 mode:minor https://open.spotify.com/track/t1",
        )
        .unwrap();
        assert!(params.contains(&("target_energy".to_string(), "0.8".to_string())));
        assert!(params.contains(&("target_mode".to_string(), "0".to_string())));
        assert!(params.contains(&("seed_genres".to_string(), "rock".to_string())));
        assert!(params.contains(&("seed_tracks".to_string(), "t1".to_string())));
    }

    #[test]
    fn test_recommendations_need_a_seed() {
        assert!(parse_recommendations("energy:50").is_err());
        assert!(parse_recommendations("genre:rock energy:500").is_err());
        assert!(parse_recommendations("genre:rock key:12").is_err());
    }
}
