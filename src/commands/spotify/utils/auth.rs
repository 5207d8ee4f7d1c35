//! Authorization-code flow: prompting a user for access, storing their token and keeping it fresh.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use poise::{
    CreateReply,
    serenity_prelude::{CreateMessage, MessageCollector},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::models::TokenResponse;
use super::spotify_api::{SpotifyError, SpotifyResult};
use crate::{Context, Data, Error};

/// How long the user gets to paste back the redirect URL.
pub const AUTH_REPLY_TIMEOUT: Duration = Duration::from_secs(120);

/// Tokens this close to expiry (in seconds) are refreshed before use.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

pub const SCOPES: &[&str] = &[
    "user-read-private",
    "user-top-read",
    "user-read-recently-played",
    "user-follow-read",
    "user-follow-modify",
    "user-library-read",
    "user-library-modify",
    "user-read-currently-playing",
    "user-read-playback-state",
    "user-read-playback-position",
    "user-modify-playback-state",
    "playlist-read-collaborative",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
];

/// A user's stored token bundle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// Unix timestamp in seconds.
    pub expires_at: i64,
    pub scope: String,
    #[serde(default)]
    pub uses_pkce: bool,
    pub token_type: String,
}

impl Token {
    pub fn is_expiring(&self, now: i64) -> bool {
        self.expires_at - now < EXPIRY_MARGIN_SECS
    }

    /// Builds a bundle from the token endpoint's reply. Refresh replies may omit the refresh
    /// token, in which case `previous_refresh` is kept.
    pub fn from_response(
        response: TokenResponse,
        previous_refresh: Option<&str>,
        now: i64,
    ) -> SpotifyResult<Self> {
        let refresh_token = match (response.refresh_token, previous_refresh) {
            (Some(token), _) => token,
            (None, Some(previous)) => previous.to_string(),
            (None, None) => {
                return Err(SpotifyError::TokenRejected(
                    "token response carried no refresh token".to_string(),
                ));
            }
        };
        Ok(Self {
            access_token: response.access_token,
            refresh_token,
            expires_at: now + response.expires_in,
            scope: response.scope,
            uses_pkce: false,
            token_type: response.token_type,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthState {
    Unauthorized,
    PendingUserReply,
    Authorized,
    Expired,
}

/// Where a user stands given their stored token. `PendingUserReply` only exists while a prompt
/// is open, so it never comes out of here.
pub fn auth_state(token: Option<&Token>, now: i64) -> AuthState {
    match token {
        None => AuthState::Unauthorized,
        Some(token) if token.is_expiring(now) => AuthState::Expired,
        Some(_) => AuthState::Authorized,
    }
}

/// Random `state` value tying a redirect to the prompt that produced it.
pub fn new_state() -> String {
    URL_SAFE_NO_PAD.encode(rand::random::<[u8; 24]>())
}

/// Pulls the authorization code out of a pasted redirect URL.
pub fn parse_redirect(content: &str, redirect_uri: &str, expected_state: &str) -> SpotifyResult<String> {
    let link = content
        .split_whitespace()
        .find(|word| word.starts_with(redirect_uri))
        .ok_or_else(|| SpotifyError::InvalidRedirect(content.to_string()))?;
    let url = url::Url::parse(link).map_err(|e| SpotifyError::InvalidRedirect(e.to_string()))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            _ => {}
        }
    }

    if state.as_deref() != Some(expected_state) {
        return Err(SpotifyError::StateMismatch);
    }
    if let Some(error) = error {
        return Err(SpotifyError::AuthorizationDeclined(error));
    }
    code.ok_or_else(|| SpotifyError::AuthorizationDeclined("missing code".to_string()))
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Refreshes the token if needed and returns an access token. A rejected refresh clears the
/// stored token.
async fn refresh_if_needed(data: &Data, user_id: u64, token: Token) -> SpotifyResult<String> {
    let now = now();
    if auth_state(Some(&token), now) == AuthState::Authorized {
        return Ok(token.access_token);
    }

    debug!("Refreshing Spotify token for user {}", user_id);
    match data.spotify.refresh_token(&token.refresh_token).await {
        Ok(response) => {
            let token = Token::from_response(response, Some(&token.refresh_token), now)?;
            data.db.save_spotify_token(user_id, Some(&token))?;
            Ok(token.access_token)
        }
        Err(e @ SpotifyError::TokenRejected(_)) => {
            warn!("Spotify refresh token for user {} was rejected, clearing it", user_id);
            data.db.save_spotify_token(user_id, None)?;
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Access token for a user who already authorized the bot. Never prompts, for background work
/// such as reaction listeners and menu buttons.
pub async fn stored_access_token(data: &Data, user_id: u64) -> SpotifyResult<String> {
    data.spotify.credentials()?;
    let token = data
        .db
        .get_spotify_user(user_id)?
        .token
        .ok_or(SpotifyError::NotAuthorized)?;
    refresh_if_needed(data, user_id, token).await
}

/// Trades an authorization code for a new token bundle and stores it. Nothing from an earlier
/// bundle is carried over.
pub async fn exchange_code(data: &Data, user_id: u64, code: &str) -> SpotifyResult<Token> {
    let token = Token::from_response(data.spotify.request_token(code).await?, None, now())?;
    data.db.save_spotify_token(user_id, Some(&token))?;
    info!("User {} authorized Spotify access", user_id);
    Ok(token)
}

/// Access token for the invoking user, walking them through authorization when nothing is
/// stored yet.
pub async fn user_access_token(ctx: Context<'_>) -> Result<String, Error> {
    let data = ctx.data();
    let user_id = ctx.author().id.get();
    let credentials = data.spotify.credentials()?;

    if let Some(token) = data.db.get_spotify_user(user_id)?.token {
        return Ok(refresh_if_needed(data, user_id, token).await?);
    }

    let state = new_state();
    let url = data.spotify.authorize_url(&state, SCOPES)?;
    debug!("Spotify auth for user {}: {:?}", user_id, AuthState::PendingUserReply);

    let instructions = format!(
        "Please accept the authorization at the following link and reply with the full URL \
         you were redirected to (it starts with `{}`). You have {} seconds.\n\n{}",
        credentials.redirect_uri,
        AUTH_REPLY_TIMEOUT.as_secs(),
        url
    );
    let dm = ctx
        .author()
        .direct_message(ctx, CreateMessage::new().content(&instructions))
        .await;
    let reply = match dm {
        Ok(_) => "I have sent you a direct message with instructions to authorize me.".to_string(),
        Err(e) => {
            debug!("Could not DM user {}: {}", user_id, e);
            instructions
        }
    };
    ctx.send(CreateReply::default().content(reply).ephemeral(true))
        .await?;

    let redirect_uri = credentials.redirect_uri.clone();
    let reply = MessageCollector::new(ctx.serenity_context())
        .author_id(ctx.author().id)
        .timeout(AUTH_REPLY_TIMEOUT)
        .filter(move |message| message.content.contains(&redirect_uri))
        .await
        .ok_or(SpotifyError::AuthorizationTimedOut)?;

    let code = parse_redirect(&reply.content, &credentials.redirect_uri, &state)?;
    let token = exchange_code(data, user_id, &code).await?;

    ctx.send(
        CreateReply::default()
            .content("Your authorization has been set!")
            .ephemeral(true),
    )
    .await?;
    Ok(token.access_token)
}
