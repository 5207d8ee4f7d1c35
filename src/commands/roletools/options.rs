use poise::{
    CreateReply,
    serenity_prelude::{self as serenity, EmojiId, GuildId, Mentionable, ReactionType},
};
use tracing::warn;

use super::autocomplete_option;
use super::utils::{
    hierarchy::check_role_hierarchy,
    models::{GuildSettings, SelectOption},
    select_menus::{build_action_rows, option_value, parse_emoji, usable_emoji},
    settings_cache::{RenderedMenu, RenderedOption},
};
use crate::{CommandResult, Context, Error};

/// Preview menus are never routed to the role handler.
const PREVIEW_CUSTOM_ID_PREFIX: &str = "RTPreview-";

/// Number of options listed on each page of `options view`.
const OPTIONS_PER_PAGE: usize = 10;

/// Manage the options that select menus are built from
#[poise::command(
    slash_command,
    subcommands("create", "delete", "view"),
    subcommand_required
)]
pub async fn options(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// The label shown when neither a label nor an emoji was given.
pub fn default_label(label: Option<String>, emoji: Option<&str>, role_name: &str) -> Option<String> {
    match (label, emoji) {
        (None, None) => Some(format!("@{}", role_name)),
        (label, _) => label,
    }
}

/// A single-option menu showing how an option looks.
fn preview(guild_id: GuildId, option: &SelectOption) -> RenderedMenu {
    RenderedMenu {
        name: option.name.clone(),
        custom_id: format!("{}{}-{}", PREVIEW_CUSTOM_ID_PREFIX, option.name, guild_id),
        min_values: 1,
        max_values: 1,
        placeholder: None,
        options: vec![RenderedOption {
            name: option.name.clone(),
            value: option_value(&option.name, option.role_id),
            label: option.label.clone().unwrap_or_else(|| option.name.clone()),
            description: option.description.clone(),
            emoji: option.emoji.clone(),
        }],
    }
}

/// Checks a user supplied emoji. Custom emojis must belong to the guild.
async fn checked_emoji(ctx: Context<'_>, guild_id: GuildId, input: &str) -> Result<Option<String>, Error> {
    let guild_emojis: Vec<EmojiId> = match parse_emoji(input) {
        Some(ReactionType::Custom { .. }) => guild_id
            .emojis(ctx.http())
            .await?
            .into_iter()
            .map(|emoji| emoji.id)
            .collect(),
        _ => Vec::new(),
    };
    let emoji = usable_emoji(input, &guild_emojis);
    if emoji.is_none() {
        warn!("Dropping unusable emoji {:?} for a select option in guild {}", input, guild_id);
    }
    Ok(emoji)
}

/// Create or replace a select option that grants a role
#[poise::command(slash_command)]
async fn create(
    ctx: Context<'_>,
    #[description = "Name of the option, no spaces"] name: String,
    #[description = "The role this option grants"] role: serenity::Role,
    #[description = "Text shown on the option, defaults to the role name"] label: Option<String>,
    #[description = "Extra text shown under the label"] description: Option<String>,
    #[description = "Emoji shown next to the label"] emoji: Option<String>,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    check_role_hierarchy(ctx, &role).await?;

    let rejected_emoji = emoji.clone();
    let emoji = match emoji.as_deref() {
        Some(input) => checked_emoji(ctx, guild_id, input).await?,
        None => None,
    };
    let rejected_emoji = rejected_emoji.filter(|_| emoji.is_none());
    let option = ctx.data().settings.create_option(
        guild_id,
        SelectOption {
            name,
            role_id: role.id,
            label: default_label(label, emoji.as_deref(), &role.name),
            description,
            emoji,
        },
    )?;

    let mut content = format!(
        "Option `{}` created for {}. Here is how it looks.",
        option.name,
        role.mention()
    );
    if let Some(rejected) = rejected_emoji {
        content.push_str(&format!(
            "\n`{}` is not an emoji I can use, so the option has none.",
            rejected
        ));
    }
    ctx.send(
        CreateReply::default()
            .content(content)
            .components(build_action_rows(&[preview(guild_id, &option)])),
    )
    .await?;
    Ok(())
}

/// Delete a select option and remove it from every menu
#[poise::command(slash_command)]
async fn delete(
    ctx: Context<'_>,
    #[description = "Name of the option"]
    #[autocomplete = "autocomplete_option"]
    name: String,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    let option = ctx.data().settings.delete_option(guild_id, &name)?;
    ctx.say(format!("Option `{}` has been deleted.", option.name))
        .await?;
    Ok(())
}

/// Lists the stored options in pages.
pub fn describe_options(settings: &GuildSettings) -> Vec<String> {
    let lines: Vec<String> = settings
        .select_options
        .values()
        .map(|option| {
            let mut line = format!("**`{}`** {}", option.name, option.role_id.mention());
            if let Some(emoji) = &option.emoji {
                line.push_str(&format!(" emoji: {}", emoji));
            }
            if let Some(label) = &option.label {
                line.push_str(&format!("\nLabel: {}", label));
            }
            if let Some(description) = &option.description {
                line.push_str(&format!("\nDescription: {}", description));
            }
            line
        })
        .collect();

    lines
        .chunks(OPTIONS_PER_PAGE)
        .map(|chunk| chunk.join("\n\n"))
        .collect()
}

/// View the select options in this server
#[poise::command(slash_command)]
async fn view(ctx: Context<'_>) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    let settings = ctx.data().settings.guild(guild_id)?;
    let pages = describe_options(&settings);
    if pages.is_empty() {
        ctx.say("There are no select options in this server.").await?;
        return Ok(());
    }

    let pages: Vec<&str> = pages.iter().map(String::as_str).collect();
    poise::builtins::paginate(ctx, &pages).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::roletools::utils::select_menus::CUSTOM_ID_PREFIX;
    use poise::serenity_prelude::RoleId;

    #[test]
    fn test_default_label_uses_role_name() {
        assert_eq!(default_label(None, None, "Gold"), Some("@Gold".to_string()));
        assert_eq!(default_label(None, Some("🎉"), "Gold"), None);
        assert_eq!(
            default_label(Some("Shiny".to_string()), None, "Gold"),
            Some("Shiny".to_string())
        );
    }

    #[test]
    fn test_options_are_paged() {
        let mut settings = GuildSettings::default();
        for i in 0..12 {
            let name = format!("opt{:02}", i);
            settings.select_options.insert(
                name.clone(),
                SelectOption {
                    name,
                    role_id: RoleId::new(i + 1),
                    label: None,
                    description: None,
                    emoji: None,
                },
            );
        }
        let pages = describe_options(&settings);
        assert_eq!(pages.len(), 2);
        assert!(pages[1].contains("opt11"));
    }

    #[test]
    fn test_preview_is_an_inert_single_option_menu() {
        let option = SelectOption {
            name: "vip".to_string(),
            role_id: RoleId::new(3),
            label: Some("@VIP".to_string()),
            description: None,
            emoji: None,
        };
        let menu = preview(GuildId::new(9), &option);
        assert_eq!(menu.custom_id, "RTPreview-vip-9");
        assert!(!menu.custom_id.starts_with(CUSTOM_ID_PREFIX));
        assert_eq!(menu.options[0].value, "RTSelect-vip-3");
    }
}
