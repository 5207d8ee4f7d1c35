//! Sample ids and API payloads used across the integration tests.

use serde_json::{Value, json};

pub const DISCORD_TOKEN: &str = "discord-test-token";
pub const CLIENT_ID: &str = "spotify-client";
pub const CLIENT_SECRET: &str = "spotify-secret";

pub const GUILD_ID: u64 = 111_111_111;
pub const ROLE_ID: u64 = 222_222_222;
pub const OTHER_ROLE_ID: u64 = 333_333_333;
pub const USER_ID: u64 = 123_456_789;

pub fn playlist(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "uri": format!("spotify:playlist:{}", id),
        "external_urls": {"spotify": format!("https://open.spotify.com/playlist/{}", id)}
    })
}

pub fn playlist_page(items: Vec<Value>, offset: u32, total: u32) -> Value {
    json!({
        "items": items,
        "offset": offset,
        "total": total,
        "next": null
    })
}

pub fn token_response(access: &str, refresh: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": access,
        "token_type": "Bearer",
        "scope": "user-read-playback-state",
        "expires_in": 3600
    });
    if let Some(refresh) = refresh {
        body["refresh_token"] = json!(refresh);
    }
    body
}

pub fn api_error(status: u16, message: &str, reason: Option<&str>) -> Value {
    let mut error = json!({"status": status, "message": message});
    if let Some(reason) = reason {
        error["reason"] = json!(reason);
    }
    json!({ "error": error })
}
