use poise::serenity_prelude::{
    self as serenity, ComponentInteraction, ComponentInteractionDataKind,
    CreateInteractionResponse, CreateInteractionResponseFollowup, Mentionable, RoleId,
    VerificationLevel,
};
use tracing::{debug, error, warn};

use super::hierarchy::{bot_can_manage, bot_member, member_passes_verification};
use super::models::RoleSettings;
use super::select_menus::{parse_menu_custom_id, parse_option_value};
use crate::{Data, Error};

const AUDIT_REASON: &str = "Role Selection";

/// The roles to add and remove for one menu press.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RoleChanges {
    pub add: Vec<RoleId>,
    pub remove: Vec<RoleId>,
}

impl RoleChanges {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// What the press handler knows about the pressing member.
#[derive(Debug, Clone, Copy)]
pub struct Presser {
    pub is_bot: bool,
    pub pending: bool,
    pub passes_verification: bool,
}

/// Works out which of the selected roles to toggle.
///
/// Roles the member lacks are added when self-assignable, roles they hold are removed when
/// self-removable. `usable` filters out roles that no longer exist or that the bot can't manage.
pub fn plan_role_changes(
    selected: &[RoleId],
    member_roles: &[RoleId],
    presser: Presser,
    usable: impl Fn(RoleId) -> bool,
    settings: impl Fn(RoleId) -> RoleSettings,
) -> RoleChanges {
    let mut changes = RoleChanges::default();
    if presser.is_bot {
        return changes;
    }

    for role_id in selected {
        if !usable(*role_id) || changes.add.contains(role_id) || changes.remove.contains(role_id) {
            continue;
        }
        let role = settings(*role_id);
        if member_roles.contains(role_id) {
            if role.selfremovable {
                changes.remove.push(*role_id);
            }
        } else if role.selfassignable && !presser.pending && presser.passes_verification {
            changes.add.push(*role_id);
        }
    }
    changes
}

/// The ephemeral reply listing what changed.
pub fn summarize(added: &[RoleId], removed: &[RoleId]) -> Option<String> {
    let mention = |roles: &[RoleId]| {
        roles
            .iter()
            .map(|r| r.mention().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut msg = String::new();
    if !added.is_empty() {
        msg.push_str(&format!(
            "I have given you the following roles: {}\n",
            mention(added)
        ));
    }
    if !removed.is_empty() {
        msg.push_str(&format!(
            "I have removed the following roles from you: {}\n",
            mention(removed)
        ));
    }
    (!msg.is_empty()).then_some(msg)
}

/// Handle a press on a role select menu
pub async fn handle_interaction(
    ctx: &serenity::Context,
    interaction: &ComponentInteraction,
    data: &Data,
) -> Result<(), Error> {
    let Some((menu, guild_id)) = parse_menu_custom_id(&interaction.data.custom_id) else {
        warn!("Ignoring malformed role select id {}", interaction.data.custom_id);
        return Ok(());
    };
    if interaction.guild_id != Some(guild_id) {
        warn!("Role select `{}` pressed outside of guild {}", menu, guild_id);
        return acknowledge(ctx, interaction).await;
    }

    let selected: Vec<RoleId> = match &interaction.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => values
            .iter()
            .filter_map(|value| parse_option_value(value))
            .map(|(_, role_id)| role_id)
            .collect(),
        _ => Vec::new(),
    };
    let Some(member) = interaction.member.as_ref() else {
        return acknowledge(ctx, interaction).await;
    };
    if selected.is_empty() || member.user.bot {
        return acknowledge(ctx, interaction).await;
    }
    debug!(
        "Role select `{}` pressed by {} in guild {}",
        menu, member.user.name, guild_id
    );

    let cached_level = ctx.cache.guild(guild_id).map(|g| g.verification_level);
    let verification_level = match cached_level {
        Some(level) => level,
        None => guild_id
            .to_partial_guild(ctx)
            .await
            .map(|g| g.verification_level)
            .unwrap_or(VerificationLevel::None),
    };
    let guild_roles = guild_id.roles(ctx).await?;
    let bot = bot_member(ctx, guild_id).await?;
    let role_settings = data.settings.guild(guild_id)?.roles;

    let presser = Presser {
        is_bot: member.user.bot,
        pending: member.pending,
        passes_verification: member_passes_verification(verification_level, member),
    };
    let changes = plan_role_changes(
        &selected,
        &member.roles,
        presser,
        |id| {
            guild_roles
                .get(&id)
                .is_some_and(|role| bot_can_manage(role, &bot, &guild_roles))
        },
        |id| role_settings.get(&id).cloned().unwrap_or_default(),
    );

    if changes.is_empty() {
        return acknowledge(ctx, interaction).await;
    }
    interaction.defer_ephemeral(ctx).await?;

    let mut added = Vec::new();
    let mut removed = Vec::new();
    for role_id in changes.add {
        match ctx
            .http
            .add_member_role(guild_id, member.user.id, role_id, Some(AUDIT_REASON))
            .await
        {
            Ok(()) => added.push(role_id),
            Err(e) => error!("Failed to add role {} to {}: {}", role_id, member.user.id, e),
        }
    }
    for role_id in changes.remove {
        match ctx
            .http
            .remove_member_role(guild_id, member.user.id, role_id, Some(AUDIT_REASON))
            .await
        {
            Ok(()) => removed.push(role_id),
            Err(e) => error!("Failed to remove role {} from {}: {}", role_id, member.user.id, e),
        }
    }

    let content = summarize(&added, &removed)
        .unwrap_or_else(|| "I couldn't change any of those roles for you.".to_string());
    interaction
        .create_followup(
            ctx,
            CreateInteractionResponseFollowup::new()
                .content(content)
                .ephemeral(true),
        )
        .await?;
    Ok(())
}

async fn acknowledge(ctx: &serenity::Context, interaction: &ComponentInteraction) -> Result<(), Error> {
    interaction
        .create_response(ctx, CreateInteractionResponse::Acknowledge)
        .await?;
    Ok(())
}
