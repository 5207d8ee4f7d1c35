//! Gateway events the cogs react to outside of commands.

use poise::serenity_prelude::{self as serenity, FullEvent, Interaction};
use tracing::error;

use crate::{Data, Error};

#[cfg(feature = "roletools")]
use crate::commands::roletools::utils::{
    component_handlers, member_events, select_menus::CUSTOM_ID_PREFIX,
};
#[cfg(feature = "spotify")]
use crate::commands::spotify::utils::reaction_handlers;

/// Dispatches gateway events to the cog handlers. Failures are logged and never reach the user.
pub async fn handler(
    ctx: &serenity::Context,
    event: &FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    let result = match event {
        #[cfg(feature = "roletools")]
        FullEvent::InteractionCreate {
            interaction: Interaction::Component(component),
        } if component.data.custom_id.starts_with(CUSTOM_ID_PREFIX) => {
            component_handlers::handle_interaction(ctx, component, data).await
        }
        #[cfg(feature = "roletools")]
        FullEvent::GuildMemberAddition { new_member } => {
            member_events::member_joined(ctx, new_member, data).await
        }
        #[cfg(feature = "roletools")]
        FullEvent::GuildMemberUpdate {
            old_if_available,
            new: Some(new),
            ..
        } => member_events::member_updated(ctx, old_if_available.as_ref(), new, data).await,
        #[cfg(feature = "roletools")]
        FullEvent::GuildMemberRemoval {
            guild_id,
            user,
            member_data_if_available,
        } => {
            member_events::member_left(*guild_id, user, member_data_if_available.as_ref(), data)
                .await
        }
        #[cfg(feature = "spotify")]
        FullEvent::ReactionAdd { add_reaction } => {
            reaction_handlers::handle_reaction(ctx, add_reaction, data).await
        }
        _ => Ok(()),
    };

    if let Err(e) = result {
        error!("Error handling {} event: {}", event.snake_case_name(), e);
    }
    Ok(())
}
