//! Role self-assignment menus and per-role settings.

pub(crate) mod options;
pub(crate) mod select;
pub(crate) mod settings;

pub mod utils;

use futures::Stream;

use crate::{CommandResult, Context};

/// Role tools commands
#[poise::command(
    slash_command,
    guild_only,
    required_permissions = "MANAGE_ROLES",
    default_member_permissions = "MANAGE_ROLES",
    subcommand_required,
    subcommands(
        "settings::selfadd",
        "settings::selfrem",
        "settings::sticky",
        "settings::autorole",
        "settings::cost",
        "select::select",
        "options::options",
    ),
    category = "Role Tools"
)]
pub async fn roletools(_: Context<'_>) -> CommandResult {
    Ok(())
}

/// Autocompletes select menu names stored for the current guild.
async fn autocomplete_menu<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Stream<Item = String> + 'a {
    let names = match ctx.guild_id() {
        Some(guild_id) => filter_names(ctx.data().settings.menu_names(guild_id), partial),
        None => Vec::new(),
    };
    futures::stream::iter(names)
}

/// Autocompletes select option names stored for the current guild.
async fn autocomplete_option<'a>(
    ctx: Context<'_>,
    partial: &'a str,
) -> impl Stream<Item = String> + 'a {
    let names = match ctx.guild_id() {
        Some(guild_id) => filter_names(ctx.data().settings.option_names(guild_id), partial),
        None => Vec::new(),
    };
    futures::stream::iter(names)
}

fn filter_names<E>(names: Result<Vec<String>, E>, partial: &str) -> Vec<String> {
    let partial = partial.to_lowercase();
    names
        .unwrap_or_default()
        .into_iter()
        .filter(|name| name.starts_with(&partial))
        .take(25)
        .collect()
}

/// Splits a list of names given as one argument, separated by spaces or commas.
fn split_names(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_names() {
        assert_eq!(split_names("vip, Member  gold"), vec!["vip", "member", "gold"]);
        assert!(split_names(" , ").is_empty());
    }

    #[test]
    fn test_filter_names_by_prefix() {
        let names: Result<_, ()> = Ok(vec!["colours".to_string(), "tier".to_string()]);
        assert_eq!(filter_names(names, "Co"), vec!["colours"]);
    }
}
