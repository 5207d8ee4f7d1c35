//! Role hierarchy and verification checks shared by commands and component handlers.

use chrono::Utc;
use poise::serenity_prelude::{self as serenity, Member, Role, RoleId, VerificationLevel};
use std::collections::HashMap;

use super::settings_cache::{RoleToolsError, RoleToolsResult};
use crate::{Context, Error};

/// Accounts must be at least this old (seconds) on guilds with medium verification or above.
pub const MIN_ACCOUNT_AGE_SECS: i64 = 5 * 60;
/// Members must have joined this long ago (seconds) on guilds with high verification or above.
pub const MIN_MEMBERSHIP_SECS: i64 = 10 * 60;

/// Position of the highest role among `role_ids`, or 0 (`@everyone`) for none.
pub fn top_position(role_ids: &[RoleId], guild_roles: &HashMap<RoleId, Role>) -> u16 {
    role_ids
        .iter()
        .filter_map(|id| guild_roles.get(id))
        .map(|role| role.position)
        .max()
        .unwrap_or(0)
}

/// Checks that `target` sits below the bot's top role and, when given, below the invoker's.
/// `invoker_top` is `None` for the guild owner, who may manage any role the bot can.
pub fn check_hierarchy(target: u16, bot_top: u16, invoker_top: Option<u16>) -> RoleToolsResult<()> {
    if target >= bot_top {
        return Err(RoleToolsError::RoleAboveBot);
    }
    if invoker_top.is_some_and(|top| target >= top) {
        return Err(RoleToolsError::RoleAboveInvoker);
    }
    Ok(())
}

/// Whether a member may receive a self-assigned role under the guild's verification level.
/// Members who already hold a role have passed verification before.
pub fn passes_verification(
    level: VerificationLevel,
    has_roles: bool,
    account_created: i64,
    joined_at: Option<i64>,
    now: i64,
) -> bool {
    if has_roles {
        return true;
    }

    let level = u8::from(level);
    if level >= u8::from(VerificationLevel::Medium) && now - account_created < MIN_ACCOUNT_AGE_SECS {
        return false;
    }
    if level >= u8::from(VerificationLevel::High) {
        return joined_at.is_some_and(|joined| now - joined > MIN_MEMBERSHIP_SECS);
    }
    true
}

/// Runs [`passes_verification`] for a member right now.
pub fn member_passes_verification(level: VerificationLevel, member: &Member) -> bool {
    passes_verification(
        level,
        !member.roles.is_empty(),
        member.user.id.created_at().unix_timestamp(),
        member.joined_at.map(|t| t.unix_timestamp()),
        Utc::now().timestamp(),
    )
}

/// Checks that the bot and the invoking member may both manage `role`.
pub async fn check_role_hierarchy(ctx: Context<'_>, role: &Role) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("This command only works in a server.")?;
    let owner_id = ctx.guild().map(|guild| guild.owner_id);

    let guild_roles = guild_id.roles(ctx).await?;
    let bot = guild_id.member(ctx, ctx.framework().bot_id).await?;
    let invoker_top = if owner_id == Some(ctx.author().id) {
        None
    } else {
        let invoker = ctx
            .author_member()
            .await
            .ok_or("I couldn't look up your roles in this server.")?;
        Some(top_position(&invoker.roles, &guild_roles))
    };

    check_hierarchy(role.position, top_position(&bot.roles, &guild_roles), invoker_top)?;
    Ok(())
}

/// Whether the bot can add or remove `role` at all.
pub fn bot_can_manage(role: &Role, bot: &Member, guild_roles: &HashMap<RoleId, Role>) -> bool {
    !role.managed && role.position < top_position(&bot.roles, guild_roles)
}

/// Looks up the bot's own member in a guild.
pub async fn bot_member(
    ctx: &serenity::Context,
    guild_id: serenity::GuildId,
) -> serenity::Result<Member> {
    let bot_id = ctx.cache.current_user().id;
    guild_id.member(ctx, bot_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use test_case::test_case;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn test_hierarchy_rules() {
        assert!(check_hierarchy(3, 5, Some(4)).is_ok());
        assert!(check_hierarchy(3, 5, None).is_ok());
        assert_matches!(check_hierarchy(5, 5, None), Err(RoleToolsError::RoleAboveBot));
        assert_matches!(
            check_hierarchy(4, 5, Some(4)),
            Err(RoleToolsError::RoleAboveInvoker)
        );
    }

    #[test]
    fn test_top_position_without_roles_is_everyone() {
        assert_eq!(top_position(&[RoleId::new(1)], &HashMap::new()), 0);
    }

    #[test_case(VerificationLevel::None, false, NOW - 10, Some(NOW - 10) => true ; "no verification")]
    #[test_case(VerificationLevel::Low, false, NOW - 10, Some(NOW - 10) => true ; "low ignores account age")]
    #[test_case(VerificationLevel::Medium, false, NOW - 10, Some(NOW - 10) => false ; "medium rejects new accounts")]
    #[test_case(VerificationLevel::Medium, false, NOW - 600, Some(NOW - 10) => true ; "medium accepts old accounts")]
    #[test_case(VerificationLevel::High, false, NOW - 6000, Some(NOW - 60) => false ; "high rejects recent joins")]
    #[test_case(VerificationLevel::High, false, NOW - 6000, Some(NOW - 700) => true ; "high accepts settled members")]
    #[test_case(VerificationLevel::Higher, false, NOW - 6000, None => false ; "unknown join time fails")]
    #[test_case(VerificationLevel::Higher, true, NOW - 10, Some(NOW - 10) => true ; "existing roles pass")]
    fn test_verification_gate(
        level: VerificationLevel,
        has_roles: bool,
        created: i64,
        joined: Option<i64>,
    ) -> bool {
        passes_verification(level, has_roles, created, joined, NOW)
    }
}
