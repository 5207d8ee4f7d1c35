//! Embed pages with ◀/▶ navigation plus play and like buttons that act for whoever presses them.

use poise::{
    CreateReply,
    serenity_prelude::{
        ButtonStyle, ComponentInteraction, ComponentInteractionCollector, CreateActionRow,
        CreateButton, CreateEmbed, CreateInteractionResponse,
        CreateInteractionResponseFollowup, CreateInteractionResponseMessage, ReactionType,
    },
};
use std::time::Duration;
use tracing::{debug, error};

use super::{
    auth::stored_access_token,
    embedded_messages::list_embeds,
    reaction_handlers::{like_uris, play_uris},
    uri::{LIKE_EMOJI, PLAY_EMOJI, SpotifyUri},
};
use crate::{CommandResult, Context, Data};

/// Buttons stop responding after this long without a press.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// One page of results. `uri` is what the play and like buttons act on.
#[derive(Clone, Debug)]
pub struct Page {
    pub embed: CreateEmbed,
    pub uri: Option<SpotifyUri>,
}

impl Page {
    /// A page for a single item with the given `spotify:` URI.
    pub fn item(embed: CreateEmbed, uri: &str) -> Self {
        Self {
            embed,
            uri: SpotifyUri::parse(uri),
        }
    }

    /// A page without anything to play.
    pub fn plain(embed: CreateEmbed) -> Self {
        Self { embed, uri: None }
    }
}

/// Detailed listings get one page per item; compact ones list several items per page and
/// have nothing to play.
pub fn build_pages<T>(
    items: &[T],
    title: &str,
    detailed: bool,
    embed: impl Fn(&T) -> CreateEmbed,
    line: impl Fn(&T) -> String,
    uri: impl Fn(&T) -> String,
) -> Vec<Page> {
    if detailed {
        return items
            .iter()
            .map(|item| Page::item(embed(item), &uri(item)))
            .collect();
    }
    let lines: Vec<String> = items.iter().map(line).collect();
    list_embeds(title, &lines)
        .into_iter()
        .map(Page::plain)
        .collect()
}

/// Index of the neighbouring page, wrapping at both ends.
pub fn next_page(current: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (current + 1) % len
    } else {
        (current + len - 1) % len
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Button {
    Previous,
    Next,
    Play,
    Like,
}

impl Button {
    const ALL: [Button; 4] = [Button::Previous, Button::Next, Button::Play, Button::Like];

    fn suffix(self) -> &'static str {
        match self {
            Button::Previous => "prev",
            Button::Next => "next",
            Button::Play => "play",
            Button::Like => "like",
        }
    }

    fn from_custom_id(prefix: &str, custom_id: &str) -> Option<Self> {
        let suffix = custom_id.strip_prefix(prefix)?;
        Self::ALL.into_iter().find(|b| b.suffix() == suffix)
    }
}

fn buttons(prefix: &str, page: &Page, pages: usize) -> Vec<CreateActionRow> {
    let mut row = Vec::new();
    if pages > 1 {
        row.push(
            CreateButton::new(format!("{}{}", prefix, Button::Previous.suffix()))
                .emoji(ReactionType::Unicode("◀".to_string()))
                .style(ButtonStyle::Secondary),
        );
        row.push(
            CreateButton::new(format!("{}{}", prefix, Button::Next.suffix()))
                .emoji(ReactionType::Unicode("▶".to_string()))
                .style(ButtonStyle::Secondary),
        );
    }
    if page.uri.is_some() {
        row.push(
            CreateButton::new(format!("{}{}", prefix, Button::Play.suffix()))
                .emoji(ReactionType::Unicode(PLAY_EMOJI.to_string()))
                .style(ButtonStyle::Primary),
        );
        row.push(
            CreateButton::new(format!("{}{}", prefix, Button::Like.suffix()))
                .emoji(ReactionType::Unicode(LIKE_EMOJI.to_string()))
                .style(ButtonStyle::Success),
        );
    }
    if row.is_empty() {
        Vec::new()
    } else {
        vec![CreateActionRow::Buttons(row)]
    }
}

/// Runs the play or like button for the presser using their stored token.
async fn act_for_presser(data: &Data, press: &ComponentInteraction, button: Button, uri: &SpotifyUri) -> String {
    let token = match stored_access_token(data, press.user.id.get()).await {
        Ok(token) => token,
        Err(e) => return e.user_message().to_string(),
    };
    let uris = std::slice::from_ref(uri);
    let result = match button {
        Button::Play => play_uris(&data.spotify, &token, uris)
            .await
            .map(|_| format!("{} Playing it on your Spotify.", PLAY_EMOJI)),
        _ => like_uris(&data.spotify, &token, uris)
            .await
            .map(|_| format!("{} Added to your library.", LIKE_EMOJI)),
    };
    result.unwrap_or_else(|e| {
        if e.is_unexpected() {
            error!("Spotify page button for {} failed: {}", press.user.id, e);
        }
        e.user_message().to_string()
    })
}

/// Sends the pages and serves button presses until the collector times out.
pub async fn paginate(ctx: Context<'_>, pages: Vec<Page>) -> CommandResult {
    let Some(first) = pages.first() else {
        return Ok(());
    };

    let prefix = ctx.id().to_string();
    let handle = ctx
        .send(
            CreateReply::default()
                .embed(first.embed.clone())
                .components(buttons(&prefix, first, pages.len())),
        )
        .await?;

    let mut current = 0;
    loop {
        let filter_prefix = prefix.clone();
        let Some(press) = ComponentInteractionCollector::new(ctx)
            .filter(move |press| press.data.custom_id.starts_with(&filter_prefix))
            .timeout(PAGE_TIMEOUT)
            .await
        else {
            break;
        };
        let Some(button) = Button::from_custom_id(&prefix, &press.data.custom_id) else {
            continue;
        };

        match button {
            Button::Previous | Button::Next => {
                current = next_page(current, pages.len(), button == Button::Next);
                let page = &pages[current];
                press
                    .create_response(
                        ctx,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new()
                                .embed(page.embed.clone())
                                .components(buttons(&prefix, page, pages.len())),
                        ),
                    )
                    .await?;
            }
            Button::Play | Button::Like => {
                let Some(uri) = pages[current].uri.clone() else {
                    continue;
                };
                press.defer_ephemeral(ctx).await?;
                let reply = act_for_presser(ctx.data(), &press, button, &uri).await;
                press
                    .create_followup(
                        ctx,
                        CreateInteractionResponseFollowup::new()
                            .content(reply)
                            .ephemeral(true),
                    )
                    .await?;
            }
        }
    }

    debug!("Pagination {} timed out", prefix);
    handle
        .edit(
            ctx,
            CreateReply::default()
                .embed(pages[current].embed.clone())
                .components(Vec::new()),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(0, 3, true, 1)]
    #[test_case(2, 3, true, 0)]
    #[test_case(0, 3, false, 2)]
    #[test_case(1, 3, false, 0)]
    #[test_case(0, 1, true, 0)]
    #[test_case(0, 0, true, 0)]
    fn test_next_page_wraps(current: usize, len: usize, forward: bool, expected: usize) {
        assert_eq!(next_page(current, len, forward), expected);
    }

    #[test]
    fn test_button_ids_round_trip_through_prefix() {
        assert_eq!(Button::from_custom_id("42", "42next"), Some(Button::Next));
        assert_eq!(Button::from_custom_id("42", "42like"), Some(Button::Like));
        assert_eq!(Button::from_custom_id("42", "43next"), None);
        assert_eq!(Button::from_custom_id("42", "42stop"), None);
    }

    #[test]
    fn test_compact_pages_have_nothing_to_play() {
        let names: Vec<String> = (0..12).map(|i| format!("song {}", i)).collect();
        let compact = build_pages(
            &names,
            "Songs",
            false,
            |_| CreateEmbed::new(),
            |n| n.clone(),
            |n| format!("spotify:track:{}", n.replace(' ', "")),
        );
        assert_eq!(compact.len(), 2);
        assert!(compact.iter().all(|p| p.uri.is_none()));

        let detailed = build_pages(
            &names,
            "Songs",
            true,
            |_| CreateEmbed::new(),
            |n| n.clone(),
            |n| format!("spotify:track:{}", n.replace(' ', "")),
        );
        assert_eq!(detailed.len(), 12);
        assert!(detailed.iter().all(|p| p.uri.is_some()));
    }

    #[test]
    fn test_item_pages_parse_their_uri() {
        let page = Page::item(CreateEmbed::new(), "spotify:track:abc");
        assert_eq!(page.uri, SpotifyUri::parse("spotify:track:abc"));
        assert!(Page::plain(CreateEmbed::new()).uri.is_none());
    }
}
