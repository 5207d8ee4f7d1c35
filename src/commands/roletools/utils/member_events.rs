//! Automatic and sticky roles applied as members join, verify and leave.

use poise::serenity_prelude::{self as serenity, GuildId, Member, RoleId, User};
use tracing::{debug, error, info};

use super::hierarchy::{bot_can_manage, bot_member};
use crate::{Data, Error};

/// Roles to give a member: auto roles first, then stored sticky roles that are still sticky.
/// Roles the member already holds are left out and duplicates are dropped.
pub fn roles_to_apply(
    auto_roles: &[RoleId],
    stored_sticky: &[RoleId],
    still_sticky: &[RoleId],
    held: &[RoleId],
) -> Vec<RoleId> {
    let mut roles: Vec<RoleId> = Vec::new();
    let sticky = stored_sticky.iter().filter(|id| still_sticky.contains(id));
    for role_id in auto_roles.iter().chain(sticky) {
        if !held.contains(role_id) && !roles.contains(role_id) {
            roles.push(*role_id);
        }
    }
    roles
}

/// A member joined. Pending members are handled once they pass membership screening.
pub async fn member_joined(ctx: &serenity::Context, member: &Member, data: &Data) -> Result<(), Error> {
    if member.user.bot || member.pending {
        return Ok(());
    }
    apply_join_roles(ctx, member, data).await
}

/// A member was updated. Applies join roles when membership screening completes.
pub async fn member_updated(
    ctx: &serenity::Context,
    old: Option<&Member>,
    new: &Member,
    data: &Data,
) -> Result<(), Error> {
    let was_pending = old.is_some_and(|m| m.pending);
    if new.user.bot || !was_pending || new.pending {
        return Ok(());
    }
    debug!("{} completed membership screening in {}", new.user.name, new.guild_id);
    apply_join_roles(ctx, new, data).await
}

/// A member left. Their sticky roles are stored so they come back on rejoin.
pub async fn member_left(
    guild_id: GuildId,
    user: &User,
    member: Option<&Member>,
    data: &Data,
) -> Result<(), Error> {
    let Some(member) = member else {
        debug!("No cached member data for {} leaving {}", user.id, guild_id);
        return Ok(());
    };
    let sticky = data.settings.sticky_roles(guild_id, &member.roles)?;
    if !sticky.is_empty() {
        info!("Storing {} sticky roles for {} in {}", sticky.len(), user.id, guild_id);
    }
    data.db.save_sticky_roles(guild_id, user.id, &sticky)?;
    Ok(())
}

async fn apply_join_roles(ctx: &serenity::Context, member: &Member, data: &Data) -> Result<(), Error> {
    let guild_id = member.guild_id;
    let auto_roles = data.settings.auto_roles(guild_id)?;
    let stored_sticky = data.db.take_sticky_roles(guild_id, member.user.id)?;
    let still_sticky = data.settings.sticky_roles(guild_id, &stored_sticky)?;

    let roles = roles_to_apply(&auto_roles, &stored_sticky, &still_sticky, &member.roles);
    if roles.is_empty() {
        return Ok(());
    }

    let guild_roles = guild_id.roles(ctx).await?;
    let bot = bot_member(ctx, guild_id).await?;
    for role_id in roles {
        let Some(role) = guild_roles.get(&role_id) else {
            continue;
        };
        if !bot_can_manage(role, &bot, &guild_roles) {
            debug!("Can't apply {} in {}, it's above my top role", role.name, guild_id);
            continue;
        }
        let reason = if auto_roles.contains(&role_id) {
            "Automatic Role"
        } else {
            "Sticky Role"
        };
        if let Err(e) = ctx
            .http
            .add_member_role(guild_id, member.user.id, role_id, Some(reason))
            .await
        {
            error!("Failed to apply {} to {}: {}", role.name, member.user.id, e);
        }
    }
    Ok(())
}
