//! Plain data types mirrored from the database for the role tools cog.

use poise::serenity_prelude::{ChannelId, GuildId, MessageId, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// Discord's hard limit on options and selectable values in a single select menu.
pub const MAX_SELECT_VALUES: u8 = 25;
/// Maximum length of a select menu or select option name.
pub const MAX_NAME_LENGTH: usize = 70;
/// Maximum length of an option label or description.
pub const MAX_LABEL_LENGTH: usize = 100;

/// The boolean per-role settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RoleFlag {
    SelfAssignable,
    SelfRemovable,
    Sticky,
    Auto,
}

impl RoleFlag {
    /// Human readable description used in command replies.
    pub fn describe(self) -> &'static str {
        match self {
            RoleFlag::SelfAssignable => "self assignable",
            RoleFlag::SelfRemovable => "self removable",
            RoleFlag::Sticky => "sticky",
            RoleFlag::Auto => "automatically applied when a member joins",
        }
    }
}

/// Settings attached to a single role. Flags are independent of each other.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoleSettings {
    pub selfassignable: bool,
    pub selfremovable: bool,
    pub sticky: bool,
    pub auto: bool,
    pub cost: Option<u64>,
    /// Names of the select options that grant this role.
    pub select_options: Vec<String>,
}

impl RoleSettings {
    pub fn flag(&self, flag: RoleFlag) -> bool {
        match flag {
            RoleFlag::SelfAssignable => self.selfassignable,
            RoleFlag::SelfRemovable => self.selfremovable,
            RoleFlag::Sticky => self.sticky,
            RoleFlag::Auto => self.auto,
        }
    }

    pub fn set_flag(&mut self, flag: RoleFlag, value: bool) {
        match flag {
            RoleFlag::SelfAssignable => self.selfassignable = value,
            RoleFlag::SelfRemovable => self.selfremovable = value,
            RoleFlag::Sticky => self.sticky = value,
            RoleFlag::Auto => self.auto = value,
        }
    }
}

/// A named option that can be placed in one or more select menus.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectOption {
    pub name: String,
    pub role_id: RoleId,
    pub label: Option<String>,
    pub description: Option<String>,
    /// Unicode emoji, `name:id` or `a:name:id`.
    pub emoji: Option<String>,
}

/// A named select menu definition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectMenu {
    pub name: String,
    /// Option names in display order.
    pub options: Vec<String>,
    pub min_values: u8,
    pub max_values: u8,
    pub placeholder: Option<String>,
    /// Every message this menu has been rendered into.
    pub messages: Vec<MessageKey>,
}

/// A `channel_id-message_id` pair identifying a sent message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MessageKey {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl MessageKey {
    pub fn new(channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            channel_id,
            message_id,
        }
    }

    /// A jump link to the message.
    pub fn link(&self, guild_id: GuildId) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            guild_id, self.channel_id, self.message_id
        )
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.channel_id, self.message_id)
    }
}

impl FromStr for MessageKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (channel, message) = s
            .split_once('-')
            .ok_or_else(|| format!("Malformed message key `{}`", s))?;
        let parse = |part: &str| {
            part.parse::<u64>()
                .ok()
                .filter(|id| *id != 0)
                .ok_or_else(|| format!("Malformed message key `{}`", s))
        };
        Ok(Self::new(
            ChannelId::new(parse(channel)?),
            MessageId::new(parse(message)?),
        ))
    }
}

impl From<MessageKey> for String {
    fn from(key: MessageKey) -> Self {
        key.to_string()
    }
}

impl TryFrom<String> for MessageKey {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Everything the role tools cog stores for one guild.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GuildSettings {
    pub roles: HashMap<RoleId, RoleSettings>,
    pub select_options: BTreeMap<String, SelectOption>,
    pub select_menus: BTreeMap<String, SelectMenu>,
}

impl GuildSettings {
    /// Roles applied to every member on join.
    pub fn auto_roles(&self) -> Vec<RoleId> {
        let mut roles: Vec<RoleId> = self
            .roles
            .iter()
            .filter(|(_, settings)| settings.auto)
            .map(|(id, _)| *id)
            .collect();
        roles.sort();
        roles
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty() && self.select_options.is_empty() && self.select_menus.is_empty()
    }
}
