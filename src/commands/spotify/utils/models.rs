//! Serde models for the parts of the Spotify Web API the commands use.
//! Unknown fields are ignored; fields Spotify may omit or null are optional or defaulted.

use serde::{Deserialize, Deserializer};

/// Deserializes a list, dropping `null` entries. Spotify returns these for unavailable items.
fn skip_nulls<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    let items: Option<Vec<Option<T>>> = Option::deserialize(deserializer)?;
    Ok(items.unwrap_or_default().into_iter().flatten().collect())
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Image {
    pub url: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Followers {
    pub total: u64,
}

/// One page of an offset-paged listing.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Paging<T> {
    #[serde(default = "Vec::new", deserialize_with = "skip_nulls", bound(deserialize = "T: Deserialize<'de>"))]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub offset: u32,
    pub next: Option<String>,
}

impl<T> Default for Paging<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            offset: 0,
            next: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SimpleArtist {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SimpleAlbum {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub album_type: Option<String>,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    #[serde(default)]
    pub images: Vec<Image>,
    pub release_date: Option<String>,
    pub total_tracks: Option<u32>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Track {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub artists: Vec<SimpleArtist>,
    pub album: Option<SimpleAlbum>,
    #[serde(default)]
    pub explicit: bool,
    pub popularity: Option<u32>,
    #[serde(default)]
    pub is_local: bool,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

impl Track {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|a| a.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Artist {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub followers: Option<Followers>,
    pub popularity: Option<u32>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PublicUser {
    pub id: String,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PrivateUser {
    pub id: String,
    pub display_name: Option<String>,
    pub product: Option<String>,
    pub country: Option<String>,
    pub email: Option<String>,
    pub followers: Option<Followers>,
    #[serde(default)]
    pub images: Vec<Image>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct TrackCount {
    #[serde(default)]
    pub total: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SimplePlaylist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    pub public: Option<bool>,
    #[serde(default)]
    pub collaborative: bool,
    pub description: Option<String>,
    pub owner: Option<PublicUser>,
    #[serde(default)]
    pub tracks: TrackCount,
    #[serde(default, deserialize_with = "skip_nulls")]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Show {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    pub publisher: Option<String>,
    pub description: Option<String>,
    pub total_episodes: Option<u32>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Episode {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub uri: String,
    pub description: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
    pub release_date: Option<String>,
    pub show: Option<Show>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Device {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    pub volume_percent: Option<u32>,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Devices {
    #[serde(default)]
    pub devices: Vec<Device>,
}

/// What is currently playing: a track or a podcast episode.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PlayingItem {
    Track(Track),
    Episode(Episode),
}

impl PlayingItem {
    pub fn uri(&self) -> &str {
        match self {
            PlayingItem::Track(track) => &track.uri,
            PlayingItem::Episode(episode) => &episode.uri,
        }
    }

    pub fn duration_ms(&self) -> u64 {
        match self {
            PlayingItem::Track(track) => track.duration_ms,
            PlayingItem::Episode(episode) => episode.duration_ms,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PlaybackContext {
    pub uri: String,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct CurrentPlayback {
    pub device: Option<Device>,
    #[serde(default = "default_repeat")]
    pub repeat_state: String,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default)]
    pub is_playing: bool,
    pub progress_ms: Option<u64>,
    pub item: Option<PlayingItem>,
    pub context: Option<PlaybackContext>,
}

fn default_repeat() -> String {
    "off".to_string()
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PlayHistory {
    pub track: Track,
    pub played_at: String,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct RecentlyPlayed {
    #[serde(default)]
    pub items: Vec<PlayHistory>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SavedTrack {
    pub track: Track,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SearchResults {
    pub tracks: Option<Paging<Track>>,
    pub artists: Option<Paging<Artist>>,
    pub albums: Option<Paging<SimpleAlbum>>,
    pub playlists: Option<Paging<SimplePlaylist>>,
    pub shows: Option<Paging<Show>>,
    pub episodes: Option<Paging<Episode>>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct FeaturedPlaylists {
    pub message: Option<String>,
    pub playlists: Paging<SimplePlaylist>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct NewReleases {
    pub albums: Paging<SimpleAlbum>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Recommendations {
    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Response of the accounts token endpoint.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// Error body of the Web API: `{"error": {"status": 403, "message": "...", "reason": "..."}}`.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApiErrorDetail {
    #[serde(default)]
    pub message: String,
    pub reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_paging_skips_null_items() {
        let page: Paging<SimplePlaylist> = serde_json::from_value(json!({
            "items": [null, {"id": "p1", "name": "Mix", "uri": "spotify:playlist:p1"}],
            "total": 2,
            "offset": 0,
            "next": null
        }))
        .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].name, "Mix");
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_playback_item_is_tagged_by_type() {
        let playback: CurrentPlayback = serde_json::from_value(json!({
            "is_playing": true,
            "repeat_state": "track",
            "item": {
                "type": "episode",
                "id": "e1",
                "name": "Episode one",
                "uri": "spotify:episode:e1",
                "duration_ms": 1000
            }
        }))
        .unwrap();
        assert_matches!(playback.item, Some(PlayingItem::Episode(ref e)) if e.id == "e1");
        assert_eq!(playback.repeat_state, "track");
    }

    #[test]
    fn test_track_artist_names() {
        let track: Track = serde_json::from_value(json!({
            "id": "t1",
            "name": "Song",
            "artists": [{"name": "A"}, {"name": "B"}]
        }))
        .unwrap();
        assert_eq!(track.artist_names(), "A, B");
    }
}
