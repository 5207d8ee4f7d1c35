use poise::serenity_prelude::{self as serenity, Mentionable};

use super::utils::{hierarchy::check_role_hierarchy, models::RoleFlag};
use crate::{CommandResult, Context};

/// Shows or sets one boolean role flag.
async fn flag_command(
    ctx: Context<'_>,
    role: serenity::Role,
    value: Option<bool>,
    flag: RoleFlag,
    command: &str,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    check_role_hierarchy(ctx, &role).await?;

    let settings = &ctx.data().settings;
    let reply = match value {
        None => {
            if settings.role(guild_id, role.id)?.flag(flag) {
                format!("The {} role is {}.", role.mention(), flag.describe())
            } else {
                format!(
                    "The {} role is not {}. Run `/roletools {} role:{} true_or_false:True` to change that.",
                    role.mention(),
                    flag.describe(),
                    command,
                    role.name
                )
            }
        }
        Some(value) => {
            settings.set_role_flag(guild_id, role.id, flag, value)?;
            if value {
                format!("The {} role is now {}.", role.mention(), flag.describe())
            } else {
                format!("The {} role is no longer {}.", role.mention(), flag.describe())
            }
        }
    };

    ctx.say(reply).await?;
    Ok(())
}

/// Set whether members can give themselves the role
#[poise::command(slash_command)]
pub async fn selfadd(
    ctx: Context<'_>,
    #[description = "The role to configure"] role: serenity::Role,
    #[description = "Leave empty to show the current setting"] true_or_false: Option<bool>,
) -> CommandResult {
    flag_command(ctx, role, true_or_false, RoleFlag::SelfAssignable, "selfadd").await
}

/// Set whether members can remove the role from themselves
#[poise::command(slash_command)]
pub async fn selfrem(
    ctx: Context<'_>,
    #[description = "The role to configure"] role: serenity::Role,
    #[description = "Leave empty to show the current setting"] true_or_false: Option<bool>,
) -> CommandResult {
    flag_command(ctx, role, true_or_false, RoleFlag::SelfRemovable, "selfrem").await
}

/// Set whether the role is given back to members who leave and rejoin
#[poise::command(slash_command)]
pub async fn sticky(
    ctx: Context<'_>,
    #[description = "The role to configure"] role: serenity::Role,
    #[description = "Leave empty to show the current setting"] true_or_false: Option<bool>,
) -> CommandResult {
    flag_command(ctx, role, true_or_false, RoleFlag::Sticky, "sticky").await
}

/// Set whether the role is given to every member who joins
#[poise::command(slash_command)]
pub async fn autorole(
    ctx: Context<'_>,
    #[description = "The role to configure"] role: serenity::Role,
    #[description = "Leave empty to show the current setting"] true_or_false: Option<bool>,
) -> CommandResult {
    flag_command(ctx, role, true_or_false, RoleFlag::Auto, "autorole").await
}

/// Show, set or clear the cost of a role
#[poise::command(slash_command)]
pub async fn cost(
    ctx: Context<'_>,
    #[description = "The role to configure"] role: serenity::Role,
    #[description = "The new cost, 0 or less clears it. Leave empty to show the current cost"]
    cost: Option<i64>,
) -> CommandResult {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    check_role_hierarchy(ctx, &role).await?;

    let settings = &ctx.data().settings;
    let reply = match cost {
        None => match settings.role(guild_id, role.id)?.cost {
            Some(cost) => format!("The {} role costs {}.", role.mention(), cost),
            None => format!("The {} role does not have a cost.", role.mention()),
        },
        Some(cost) => match settings.set_role_cost(guild_id, role.id, Some(cost))? {
            Some(cost) => format!("The {} role now costs {}.", role.mention(), cost),
            None => format!("The {} role no longer has a cost.", role.mention()),
        },
    };

    ctx.say(reply).await?;
    Ok(())
}
