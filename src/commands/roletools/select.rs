use std::sync::LazyLock;

use poise::{
    CreateReply,
    serenity_prelude::{
        self as serenity, ChannelId, CreateMessage, EditMessage, GuildId, Mentionable, MessageId,
    },
};
use regex::Regex;
use tracing::{info, warn};

use super::utils::{
    models::{GuildSettings, MessageKey},
    select_menus::build_action_rows,
    settings_cache::{NewMenu, RenderedMenu},
};
use super::{autocomplete_menu, split_names};
use crate::{CommandResult, Context, Error};

/// Discord allows at most five action rows on a message.
const MAX_MENUS_PER_MESSAGE: usize = 5;

static MESSAGE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:(?:ptb|canary)\.)?discord(?:app)?\.com/channels/(\d+)/(\d+)/(\d+)")
        .expect("Invalid message link regex")
});

/// Extracts the guild, channel and message ids from a message link.
pub fn parse_message_link(link: &str) -> Option<(GuildId, ChannelId, MessageId)> {
    let caps = MESSAGE_LINK_RE.captures(link)?;
    let id = |i: usize| {
        caps.get(i)?
            .as_str()
            .parse::<u64>()
            .ok()
            .filter(|id| *id != 0)
    };
    Some((
        GuildId::new(id(1)?),
        ChannelId::new(id(2)?),
        MessageId::new(id(3)?),
    ))
}

/// Renders each named menu, failing on the first one that doesn't exist.
fn render_menus(ctx: Context<'_>, guild_id: GuildId, names: &[String]) -> Result<Vec<RenderedMenu>, Error> {
    if names.is_empty() {
        return Err("You must provide at least one select menu.".into());
    }
    if names.len() > MAX_MENUS_PER_MESSAGE {
        return Err(format!("You can only send up to {} select menus per message.", MAX_MENUS_PER_MESSAGE).into());
    }

    let settings = &ctx.data().settings;
    let mut menus = Vec::with_capacity(names.len());
    for name in names {
        let menu = settings.render_menu(guild_id, name)?;
        if menu.options.is_empty() {
            return Err(format!("The select menu `{}` has no options left to show.", name).into());
        }
        menus.push(menu);
    }
    Ok(menus)
}

fn record_message(ctx: Context<'_>, guild_id: GuildId, menus: &[RenderedMenu], key: MessageKey) -> Result<(), Error> {
    for menu in menus {
        ctx.data()
            .settings
            .record_menu_message(guild_id, &menu.name, key)?;
    }
    Ok(())
}

/// Manage role select menus
#[poise::command(
    slash_command,
    subcommands("create", "delete", "send", "edit", "view"),
    subcommand_required
)]
pub async fn select(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// Create or replace a select menu from existing options
#[poise::command(slash_command)]
async fn create(
    ctx: Context<'_>,
    #[description = "Name of the menu, no spaces"] name: String,
    #[description = "Option names separated by spaces or commas"] options: String,
    #[description = "Minimum number of options to select"]
    #[min = 0]
    #[max = 25]
    min_values: Option<i64>,
    #[description = "Maximum number of options to select, defaults to the number of options"]
    #[min = 0]
    #[max = 25]
    max_values: Option<i64>,
    #[description = "Text shown while nothing is selected"] placeholder: Option<String>,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;

    let menu = ctx.data().settings.create_menu(
        guild_id,
        NewMenu {
            name,
            options: split_names(&options),
            min_values,
            max_values,
            placeholder,
        },
    )?;
    info!("Created select menu `{}` in {}", menu.name, guild_id);

    let rendered = render_menus(ctx, guild_id, std::slice::from_ref(&menu.name))?;
    let handle = ctx
        .send(
            CreateReply::default()
                .content(format!("Here is how the `{}` select menu looks.", menu.name))
                .components(build_action_rows(&rendered)),
        )
        .await?;
    let message = handle.message().await?;
    record_message(ctx, guild_id, &rendered, MessageKey::new(message.channel_id, message.id))?;
    Ok(())
}

/// Delete a select menu
#[poise::command(slash_command)]
async fn delete(
    ctx: Context<'_>,
    #[description = "Name of the menu"]
    #[autocomplete = "autocomplete_menu"]
    name: String,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    let menu = ctx.data().settings.delete_menu(guild_id, &name)?;
    ctx.say(format!("Select menu `{}` has been deleted.", menu.name))
        .await?;
    Ok(())
}

/// Send a message with up to five select menus to a channel
#[poise::command(slash_command)]
async fn send(
    ctx: Context<'_>,
    #[description = "Where to send the menus"]
    #[channel_types("Text", "News")]
    channel: serenity::GuildChannel,
    #[description = "Menu names separated by spaces or commas"] menus: String,
    #[description = "The message to send with the menus"] message: String,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    let rendered = render_menus(ctx, guild_id, &split_names(&menus))?;

    let sent = channel
        .send_message(
            ctx,
            CreateMessage::new()
                .content(message)
                .components(build_action_rows(&rendered)),
        )
        .await?;
    record_message(ctx, guild_id, &rendered, MessageKey::new(sent.channel_id, sent.id))?;

    ctx.send(
        CreateReply::default()
            .content(format!("Sent the select menus to {}.", channel.mention()))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Replace the select menus on one of my messages
#[poise::command(slash_command)]
async fn edit(
    ctx: Context<'_>,
    #[description = "Link to the message to edit"] message_link: String,
    #[description = "Menu names separated by spaces or commas"] menus: String,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    let (link_guild, channel_id, message_id) =
        parse_message_link(&message_link).ok_or("That is not a valid message link.")?;
    if link_guild != guild_id {
        return Err("That message is not in this server.".into());
    }

    let mut message = channel_id.message(ctx, message_id).await?;
    if message.author.id != ctx.framework().bot_id {
        return Err("I can only edit my own messages.".into());
    }

    let rendered = render_menus(ctx, guild_id, &split_names(&menus))?;
    message
        .edit(ctx, EditMessage::new().components(build_action_rows(&rendered)))
        .await?;
    record_message(ctx, guild_id, &rendered, MessageKey::new(channel_id, message_id))?;

    ctx.send(
        CreateReply::default()
            .content(format!("Updated {}.", message.link()))
            .ephemeral(true),
    )
    .await?;
    Ok(())
}

/// Describes every stored menu, one page per menu.
pub fn describe_menus(guild_id: GuildId, settings: &GuildSettings) -> Vec<String> {
    settings
        .select_menus
        .values()
        .map(|menu| {
            let options = menu
                .options
                .iter()
                .map(|name| match settings.select_options.get(name) {
                    Some(option) => format!("`{}` ({})", name, option.role_id.mention()),
                    None => {
                        warn!("Select menu `{}` lists missing option `{}`", menu.name, name);
                        format!("`{}` (missing)", name)
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            let messages = if menu.messages.is_empty() {
                "Never sent".to_string()
            } else {
                menu.messages
                    .iter()
                    .map(|key| key.link(guild_id))
                    .collect::<Vec<_>>()
                    .join("\n")
            };
            format!(
                "**Select menu `{}`**\nOptions: {}\nMin values: {}\nMax values: {}\nPlaceholder: {}\nMessages:\n{}",
                menu.name,
                options,
                menu.min_values,
                menu.max_values,
                menu.placeholder.as_deref().unwrap_or("None"),
                messages,
            )
        })
        .collect()
}

/// View the select menus in this server
#[poise::command(slash_command)]
async fn view(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    let settings = ctx.data().settings.guild(guild_id)?;
    let pages = describe_menus(guild_id, &settings);
    if pages.is_empty() {
        ctx.say("There are no select menus in this server.").await?;
        return Ok(());
    }

    let pages: Vec<&str> = pages.iter().map(String::as_str).collect();
    poise::builtins::paginate(ctx, &pages).await?;
    Ok(())
}
