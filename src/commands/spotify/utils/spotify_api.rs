use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use reqwest::{Method, RequestBuilder, Response, StatusCode, header};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, error};

use super::models::{
    Artist, CurrentPlayback, Devices, FeaturedPlaylists, NewReleases, Paging, PrivateUser,
    Recommendations, RecentlyPlayed, SavedTrack, SearchResults, SimpleAlbum, SimplePlaylist,
    TokenResponse, Track,
};
use super::uri::SearchType;
use crate::HTTP_CLIENT;
use crate::config::SpotifyCredentials;
use crate::utils::database::DbError;

pub const SPOTIFY_API_BASE: &str = "https://api.spotify.com/v1";
pub const SPOTIFY_ACCOUNTS_BASE: &str = "https://accounts.spotify.com";

/// Largest page the Web API hands out for library listings.
const PAGE_LIMIT: u32 = 50;

const GENERIC_MESSAGE: &str =
    "An exception has occurred, please contact the bot owner for more assistance.";

#[derive(Error, Debug)]
pub enum SpotifyError {
    #[error("Spotify application credentials are not configured")]
    MissingCredentials,

    #[error("User has not authorized the bot")]
    NotAuthorized,

    #[error("Timed out waiting for the authorization reply")]
    AuthorizationTimedOut,

    #[error("Authorization reply did not contain a code: {0}")]
    AuthorizationDeclined(String),

    #[error("Authorization reply state did not match")]
    StateMismatch,

    #[error("Authorization reply is not a valid redirect: {0}")]
    InvalidRedirect(String),

    #[error("Token endpoint rejected the grant: {0}")]
    TokenRejected(String),

    #[error("No active device")]
    NoActiveDevice,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Premium required: {0}")]
    PremiumRequired(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Access token rejected: {0}")]
    Unauthorized(String),

    #[error("Spotify API error: {status} - {message}")]
    Api { status: StatusCode, message: String },

    #[error("Failed to reach Spotify: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl SpotifyError {
    /// The text shown to the Discord user for this failure.
    pub fn user_message(&self) -> &'static str {
        match self {
            SpotifyError::MissingCredentials => {
                "The bot owner needs to set their Spotify credentials before this command can be used."
            }
            SpotifyError::NotAuthorized => "You need to authorize me to interact with spotify.",
            SpotifyError::AuthorizationTimedOut | SpotifyError::AuthorizationDeclined(_) => {
                "Alright I won't interact with spotify for you."
            }
            SpotifyError::StateMismatch | SpotifyError::InvalidRedirect(_) => {
                "That doesn't look like the link I sent you, please run the command again."
            }
            SpotifyError::TokenRejected(_) => {
                "Your refresh token has been revoked, clearing data."
            }
            SpotifyError::NoActiveDevice => {
                "I could not find an active device to send requests for."
            }
            SpotifyError::NotFound(_) => "I could not find that on Spotify.",
            SpotifyError::PremiumRequired(_) => "This action is prohibited for non-premium users.",
            SpotifyError::Forbidden(_) => "I couldn't perform that action for you.",
            SpotifyError::Unauthorized(_)
            | SpotifyError::Api { .. }
            | SpotifyError::Http(_)
            | SpotifyError::Db(_) => GENERIC_MESSAGE,
        }
    }

    /// Failures the user can't act on; these get logged.
    pub fn is_unexpected(&self) -> bool {
        self.user_message() == GENERIC_MESSAGE
    }
}

pub type SpotifyResult<T> = Result<T, SpotifyError>;

/// Maps a failed Web API response from `path` onto the errors commands report. Only the player
/// endpoints answer 404 for a missing device.
pub fn error_from_status(status: StatusCode, path: &str, body: &str) -> SpotifyError {
    let message = serde_json::from_str::<super::models::ApiErrorBody>(body)
        .map(|b| match b.error.reason {
            Some(reason) => format!("{} ({})", b.error.message, reason),
            None => b.error.message,
        })
        .unwrap_or_else(|_| body.to_string());

    match status {
        StatusCode::NOT_FOUND if path.contains("/me/player") => SpotifyError::NoActiveDevice,
        StatusCode::NOT_FOUND => SpotifyError::NotFound(message),
        StatusCode::UNAUTHORIZED => SpotifyError::Unauthorized(message),
        StatusCode::FORBIDDEN
            if message.contains("PREMIUM_REQUIRED") || message.contains("non-premium") =>
        {
            SpotifyError::PremiumRequired(message)
        }
        StatusCode::FORBIDDEN => SpotifyError::Forbidden(message),
        status => SpotifyError::Api { status, message },
    }
}

/// Thin wrapper over the Spotify Web API acting on behalf of one user per call.
pub struct SpotifyClient {
    credentials: RwLock<Option<SpotifyCredentials>>,
    api_base: String,
    accounts_base: String,
}

impl SpotifyClient {
    pub fn new(credentials: Option<SpotifyCredentials>) -> Self {
        Self::with_base_urls(credentials, SPOTIFY_API_BASE, SPOTIFY_ACCOUNTS_BASE)
    }

    /// Points the client at other hosts, e.g. a mock server.
    pub fn with_base_urls(
        credentials: Option<SpotifyCredentials>,
        api_base: impl Into<String>,
        accounts_base: impl Into<String>,
    ) -> Self {
        Self {
            credentials: RwLock::new(credentials),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            accounts_base: accounts_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn credentials(&self) -> SpotifyResult<SpotifyCredentials> {
        self.credentials
            .read()
            .map_err(|_| SpotifyError::MissingCredentials)?
            .clone()
            .ok_or(SpotifyError::MissingCredentials)
    }

    /// Replaces the application credentials until the next restart.
    pub fn set_credentials(&self, credentials: SpotifyCredentials) {
        match self.credentials.write() {
            Ok(mut guard) => *guard = Some(credentials),
            Err(poisoned) => *poisoned.into_inner() = Some(credentials),
        }
    }

    /// URL the user opens to grant the bot access to their account.
    pub fn authorize_url(&self, state: &str, scopes: &[&str]) -> SpotifyResult<String> {
        let credentials = self.credentials()?;
        let mut url = url::Url::parse(&format!("{}/authorize", self.accounts_base))
            .map_err(|e| SpotifyError::InvalidRedirect(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &credentials.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &credentials.redirect_uri)
            .append_pair("scope", &scopes.join(" "))
            .append_pair("state", state);
        Ok(url.into())
    }

    /// Exchanges the `code` from the redirect for a token.
    pub async fn request_token(&self, code: &str) -> SpotifyResult<TokenResponse> {
        let credentials = self.credentials()?;
        self.token_request(
            &credentials,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &credentials.redirect_uri),
            ],
        )
        .await
    }

    pub async fn refresh_token(&self, refresh_token: &str) -> SpotifyResult<TokenResponse> {
        let credentials = self.credentials()?;
        self.token_request(
            &credentials,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn token_request(
        &self,
        credentials: &SpotifyCredentials,
        params: &[(&str, &str)],
    ) -> SpotifyResult<TokenResponse> {
        let auth = BASE64_STANDARD.encode(format!(
            "{}:{}",
            credentials.client_id, credentials.client_secret
        ));
        let response = HTTP_CLIENT
            .post(format!("{}/api/token", self.accounts_base))
            .header(header::AUTHORIZATION, format!("Basic {}", auth))
            .form(params)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "Cannot read response".to_string());
            return Err(SpotifyError::TokenRejected(text));
        }
        Ok(check_status(response).await?.json().await?)
    }

    fn request(&self, method: Method, token: &str, path: &str) -> RequestBuilder {
        HTTP_CLIENT
            .request(method, format!("{}{}", self.api_base, path))
            .header(header::AUTHORIZATION, format!("Bearer {}", token))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        token: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> SpotifyResult<T> {
        let response = self.request(Method::GET, token, path).query(query).send().await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Sends a request whose response body is ignored.
    async fn send(&self, request: RequestBuilder) -> SpotifyResult<()> {
        check_status(request.send().await?).await?;
        Ok(())
    }

    pub async fn me(&self, token: &str) -> SpotifyResult<PrivateUser> {
        self.get(token, "/me", &[]).await
    }

    /// The user's playback state, `None` when nothing is playing on any device.
    pub async fn current_playback(&self, token: &str) -> SpotifyResult<Option<CurrentPlayback>> {
        let response = self
            .request(Method::GET, token, "/me/player")
            .query(&[("additional_types", "track,episode")])
            .send()
            .await?;
        let response = check_status(response).await?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Ok(None);
        }
        serde_json::from_slice(&body).map(Some).map_err(|e| SpotifyError::Api {
            status: StatusCode::OK,
            message: format!("Failed to parse playback state: {}", e),
        })
    }

    pub async fn devices(&self, token: &str) -> SpotifyResult<Devices> {
        self.get(token, "/me/player/devices", &[]).await
    }

    pub async fn pause(&self, token: &str) -> SpotifyResult<()> {
        self.send(self.request(Method::PUT, token, "/me/player/pause"))
            .await
    }

    /// Resumes whatever was playing.
    pub async fn resume(&self, token: &str) -> SpotifyResult<()> {
        self.send(self.request(Method::PUT, token, "/me/player/play").json(&json!({})))
            .await
    }

    pub async fn start_tracks(&self, token: &str, uris: &[String]) -> SpotifyResult<()> {
        self.send(
            self.request(Method::PUT, token, "/me/player/play")
                .json(&json!({ "uris": uris })),
        )
        .await
    }

    /// Plays an album, playlist, artist or show, optionally starting at a track.
    pub async fn start_context(
        &self,
        token: &str,
        context_uri: &str,
        offset_uri: Option<&str>,
    ) -> SpotifyResult<()> {
        let mut body = json!({ "context_uri": context_uri });
        if let Some(uri) = offset_uri {
            body["offset"] = json!({ "uri": uri });
        }
        self.send(self.request(Method::PUT, token, "/me/player/play").json(&body))
            .await
    }

    pub async fn next_track(&self, token: &str) -> SpotifyResult<()> {
        self.send(self.request(Method::POST, token, "/me/player/next"))
            .await
    }

    pub async fn previous_track(&self, token: &str) -> SpotifyResult<()> {
        self.send(self.request(Method::POST, token, "/me/player/previous"))
            .await
    }

    pub async fn add_to_queue(&self, token: &str, uri: &str) -> SpotifyResult<()> {
        self.send(
            self.request(Method::POST, token, "/me/player/queue")
                .query(&[("uri", uri)]),
        )
        .await
    }

    pub async fn set_repeat(&self, token: &str, state: &str) -> SpotifyResult<()> {
        self.send(
            self.request(Method::PUT, token, "/me/player/repeat")
                .query(&[("state", state)]),
        )
        .await
    }

    pub async fn set_shuffle(&self, token: &str, state: bool) -> SpotifyResult<()> {
        self.send(
            self.request(Method::PUT, token, "/me/player/shuffle")
                .query(&[("state", state.to_string())]),
        )
        .await
    }

    pub async fn seek(&self, token: &str, position_ms: u64) -> SpotifyResult<()> {
        self.send(
            self.request(Method::PUT, token, "/me/player/seek")
                .query(&[("position_ms", position_ms.to_string())]),
        )
        .await
    }

    pub async fn set_volume(&self, token: &str, volume_percent: u8) -> SpotifyResult<()> {
        self.send(
            self.request(Method::PUT, token, "/me/player/volume")
                .query(&[("volume_percent", volume_percent.min(100).to_string())]),
        )
        .await
    }

    pub async fn transfer_playback(
        &self,
        token: &str,
        device_id: &str,
        play: bool,
    ) -> SpotifyResult<()> {
        self.send(
            self.request(Method::PUT, token, "/me/player")
                .json(&json!({ "device_ids": [device_id], "play": play })),
        )
        .await
    }

    pub async fn followed_playlists(
        &self,
        token: &str,
        offset: u32,
    ) -> SpotifyResult<Paging<SimplePlaylist>> {
        self.get(
            token,
            "/me/playlists",
            &[
                ("limit", PAGE_LIMIT.to_string()),
                ("offset", offset.to_string()),
            ],
        )
        .await
    }

    /// Walks the user's playlists page by page until `total` are collected.
    pub async fn all_followed_playlists(&self, token: &str) -> SpotifyResult<Vec<SimplePlaylist>> {
        let mut playlists = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.followed_playlists(token, offset).await?;
            if page.items.is_empty() {
                break;
            }
            offset += page.items.len() as u32;
            playlists.extend(page.items);
            if offset >= page.total {
                break;
            }
        }
        debug!("Fetched {} followed playlists", playlists.len());
        Ok(playlists)
    }

    pub async fn saved_tracks(&self, token: &str) -> SpotifyResult<Paging<SavedTrack>> {
        self.get(token, "/me/tracks", &[("limit", PAGE_LIMIT.to_string())])
            .await
    }

    pub async fn save_tracks(&self, token: &str, ids: &[String]) -> SpotifyResult<()> {
        self.save_ids(token, "/me/tracks", ids).await
    }

    pub async fn save_albums(&self, token: &str, ids: &[String]) -> SpotifyResult<()> {
        self.save_ids(token, "/me/albums", ids).await
    }

    /// The library endpoints take at most 50 ids per call.
    async fn save_ids(&self, token: &str, path: &str, ids: &[String]) -> SpotifyResult<()> {
        for chunk in ids.chunks(PAGE_LIMIT as usize) {
            self.send(
                self.request(Method::PUT, token, path)
                    .json(&json!({ "ids": chunk })),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn follow_playlist(
        &self,
        token: &str,
        playlist_id: &str,
        public: bool,
    ) -> SpotifyResult<()> {
        self.send(
            self.request(
                Method::PUT,
                token,
                &format!("/playlists/{}/followers", playlist_id),
            )
            .json(&json!({ "public": public })),
        )
        .await
    }

    pub async fn follow_artists(&self, token: &str, ids: &[String]) -> SpotifyResult<()> {
        for chunk in ids.chunks(PAGE_LIMIT as usize) {
            self.send(
                self.request(Method::PUT, token, "/me/following")
                    .query(&[("type", "artist")])
                    .json(&json!({ "ids": chunk })),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn top_tracks(&self, token: &str) -> SpotifyResult<Paging<Track>> {
        self.get(token, "/me/top/tracks", &[("limit", PAGE_LIMIT.to_string())])
            .await
    }

    pub async fn top_artists(&self, token: &str) -> SpotifyResult<Paging<Artist>> {
        self.get(token, "/me/top/artists", &[("limit", PAGE_LIMIT.to_string())])
            .await
    }

    pub async fn recently_played(&self, token: &str) -> SpotifyResult<RecentlyPlayed> {
        self.get(
            token,
            "/me/player/recently-played",
            &[("limit", PAGE_LIMIT.to_string())],
        )
        .await
    }

    pub async fn new_releases(&self, token: &str) -> SpotifyResult<NewReleases> {
        self.get(token, "/browse/new-releases", &[("limit", PAGE_LIMIT.to_string())])
            .await
    }

    pub async fn featured_playlists(&self, token: &str) -> SpotifyResult<FeaturedPlaylists> {
        self.get(
            token,
            "/browse/featured-playlists",
            &[("limit", PAGE_LIMIT.to_string())],
        )
        .await
    }

    pub async fn search(
        &self,
        token: &str,
        query: &str,
        search_type: SearchType,
    ) -> SpotifyResult<SearchResults> {
        self.get(
            token,
            "/search",
            &[
                ("q", query.to_string()),
                ("type", search_type.as_str().to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ],
        )
        .await
    }

    pub async fn recommendations(
        &self,
        token: &str,
        params: &[(String, String)],
    ) -> SpotifyResult<Recommendations> {
        let mut query: Vec<(&str, String)> = params
            .iter()
            .map(|(k, v)| (k.as_str(), v.clone()))
            .collect();
        query.push(("limit", "100".to_string()));
        self.get(token, "/recommendations", &query).await
    }

    pub async fn create_playlist(
        &self,
        token: &str,
        user_id: &str,
        name: &str,
        public: bool,
        description: &str,
    ) -> SpotifyResult<SimplePlaylist> {
        let response = self
            .request(Method::POST, token, &format!("/users/{}/playlists", user_id))
            .json(&json!({ "name": name, "public": public, "description": description }))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Adds tracks in chunks of 100, the most the endpoint accepts.
    pub async fn add_playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> SpotifyResult<()> {
        for chunk in uris.chunks(100) {
            self.send(
                self.request(
                    Method::POST,
                    token,
                    &format!("/playlists/{}/tracks", playlist_id),
                )
                .json(&json!({ "uris": chunk })),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn remove_playlist_tracks(
        &self,
        token: &str,
        playlist_id: &str,
        uris: &[String],
    ) -> SpotifyResult<()> {
        for chunk in uris.chunks(100) {
            let tracks: Vec<Value> = chunk.iter().map(|uri| json!({ "uri": uri })).collect();
            self.send(
                self.request(
                    Method::DELETE,
                    token,
                    &format!("/playlists/{}/tracks", playlist_id),
                )
                .json(&json!({ "tracks": tracks })),
            )
            .await?;
        }
        Ok(())
    }

    pub async fn artist_albums(
        &self,
        token: &str,
        artist_id: &str,
    ) -> SpotifyResult<Paging<SimpleAlbum>> {
        self.get(
            token,
            &format!("/artists/{}/albums", artist_id),
            &[("limit", PAGE_LIMIT.to_string())],
        )
        .await
    }
}

/// Turns non-success responses into a [`SpotifyError`].
async fn check_status(response: Response) -> SpotifyResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let path = response.url().path().to_string();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Cannot read response".to_string());
    let err = error_from_status(status, &path, &text);
    if err.is_unexpected() {
        error!("Spotify API error on {}: {} - {}", path, status, text);
    }
    Err(err)
}
