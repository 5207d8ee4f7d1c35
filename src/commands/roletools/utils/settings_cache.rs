//! In-memory mirror of the role tools settings stored in the database.
//!
//! Every guild is loaded from the [`SettingsStore`] the first time it is touched and kept for the
//! lifetime of the process. Writes go to the store first and only then to the mirror, so a failed
//! write leaves the mirror exactly as it was.

use dashmap::{DashMap, mapref::one::RefMut};
use poise::serenity_prelude::{GuildId, RoleId};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::models::{
    GuildSettings, MAX_LABEL_LENGTH, MAX_NAME_LENGTH, MAX_SELECT_VALUES, MessageKey, RoleFlag,
    RoleSettings, SelectMenu, SelectOption,
};
use super::select_menus::{menu_custom_id, option_value};
use crate::utils::database::{DbError, DbResult};

/// Persistence behind the settings mirror.
#[cfg_attr(test, mockall::automock)]
pub trait SettingsStore: Send + Sync {
    fn load_guild(&self, guild_id: GuildId) -> DbResult<GuildSettings>;
    fn guild_ids(&self) -> DbResult<Vec<GuildId>>;
    fn save_role(&self, guild_id: GuildId, role_id: RoleId, role: &RoleSettings) -> DbResult<()>;
    fn save_select_option(&self, guild_id: GuildId, option: &SelectOption) -> DbResult<()>;
    fn delete_select_option(&self, guild_id: GuildId, name: &str) -> DbResult<()>;
    fn save_select_menu(&self, guild_id: GuildId, menu: &SelectMenu) -> DbResult<()>;
    fn delete_select_menu(&self, guild_id: GuildId, name: &str) -> DbResult<()>;
}

#[derive(Error, Debug)]
pub enum RoleToolsError {
    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("`{0}` is not a valid name. Names must not be empty or contain spaces.")]
    InvalidName(String),

    #[error("Names can be at most {MAX_NAME_LENGTH} characters long.")]
    NameTooLong,

    #[error("The option `{0}` does not exist.")]
    OptionNotFound(String),

    #[error("The select menu `{0}` does not exist.")]
    MenuNotFound(String),

    #[error("You must provide at least one option.")]
    NoOptions,

    #[error("A select menu can have at most {MAX_SELECT_VALUES} options.")]
    TooManyOptions,

    #[error("That role is higher than or equal to my highest role, so I can't manage it.")]
    RoleAboveBot,

    #[error("That role is higher than or equal to your highest role.")]
    RoleAboveInvoker,
}

pub type RoleToolsResult<T> = Result<T, RoleToolsError>;

/// Arguments for creating (or replacing) a select menu.
#[derive(Clone, Debug, Default)]
pub struct NewMenu {
    pub name: String,
    pub options: Vec<String>,
    pub min_values: Option<i64>,
    pub max_values: Option<i64>,
    pub placeholder: Option<String>,
}

/// A select menu resolved against the current options, ready to be turned into a component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedMenu {
    pub name: String,
    pub custom_id: String,
    pub min_values: u8,
    pub max_values: u8,
    pub placeholder: Option<String>,
    pub options: Vec<RenderedOption>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedOption {
    pub name: String,
    pub value: String,
    pub label: String,
    pub description: Option<String>,
    pub emoji: Option<String>,
}

/// Lowercases a user supplied option or menu name and checks it's usable as a key.
pub fn normalize_name(name: &str) -> RoleToolsResult<String> {
    let name = name.trim().to_lowercase();
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(RoleToolsError::InvalidName(name));
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        return Err(RoleToolsError::NameTooLong);
    }
    Ok(name)
}

fn truncate(text: Option<String>, max: usize) -> Option<String> {
    text.map(|t| t.chars().take(max).collect())
}

fn clamp_values(value: i64) -> u8 {
    value.clamp(0, MAX_SELECT_VALUES as i64) as u8
}

pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    guilds: DashMap<GuildId, GuildSettings>,
}

impl SettingsCache {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            guilds: DashMap::new(),
        }
    }

    /// Loads every guild that has stored settings. Returns how many guilds were loaded.
    pub fn warm(&self) -> RoleToolsResult<usize> {
        let guild_ids = self.store.guild_ids()?;
        let mut loaded = 0;
        for guild_id in guild_ids {
            match self.entry(guild_id) {
                Ok(_) => loaded += 1,
                Err(e) => warn!("Failed to load role settings for guild {}: {}", guild_id, e),
            }
        }
        info!("Loaded role settings for {} guilds", loaded);
        Ok(loaded)
    }

    /// Locks the guild's entry, loading it from the store on first access.
    fn entry(&self, guild_id: GuildId) -> RoleToolsResult<RefMut<'_, GuildId, GuildSettings>> {
        let entry = self.guilds.entry(guild_id).or_try_insert_with(|| {
            debug!("Loading role settings for guild {}", guild_id);
            self.store.load_guild(guild_id)
        })?;
        Ok(entry)
    }

    /// A snapshot of everything stored for the guild.
    pub fn guild(&self, guild_id: GuildId) -> RoleToolsResult<GuildSettings> {
        Ok(self.entry(guild_id)?.clone())
    }

    /// The role's settings, or the defaults if nothing was ever stored for it.
    pub fn role(&self, guild_id: GuildId, role_id: RoleId) -> RoleToolsResult<RoleSettings> {
        Ok(self
            .entry(guild_id)?
            .roles
            .get(&role_id)
            .cloned()
            .unwrap_or_default())
    }

    /// Sets one of the role's flags and returns its previous value.
    pub fn set_role_flag(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        flag: RoleFlag,
        value: bool,
    ) -> RoleToolsResult<bool> {
        let mut guild = self.entry(guild_id)?;
        let mut role = guild.roles.get(&role_id).cloned().unwrap_or_default();
        let previous = role.flag(flag);
        role.set_flag(flag, value);

        self.store.save_role(guild_id, role_id, &role)?;
        guild.roles.insert(role_id, role);
        Ok(previous)
    }

    /// Sets the role's cost. Zero, negative or missing values clear it.
    pub fn set_role_cost(
        &self,
        guild_id: GuildId,
        role_id: RoleId,
        cost: Option<i64>,
    ) -> RoleToolsResult<Option<u64>> {
        let mut guild = self.entry(guild_id)?;
        let mut role = guild.roles.get(&role_id).cloned().unwrap_or_default();
        role.cost = cost.filter(|c| *c > 0).map(|c| c as u64);

        self.store.save_role(guild_id, role_id, &role)?;
        let cost = role.cost;
        guild.roles.insert(role_id, role);
        Ok(cost)
    }

    pub fn auto_roles(&self, guild_id: GuildId) -> RoleToolsResult<Vec<RoleId>> {
        Ok(self.entry(guild_id)?.auto_roles())
    }

    /// Filters `roles` down to those currently flagged as sticky.
    pub fn sticky_roles(&self, guild_id: GuildId, roles: &[RoleId]) -> RoleToolsResult<Vec<RoleId>> {
        let guild = self.entry(guild_id)?;
        Ok(roles
            .iter()
            .filter(|id| guild.roles.get(id).is_some_and(|r| r.sticky))
            .copied()
            .collect())
    }

    /// Creates or replaces a select option and records it in the role's reverse index.
    pub fn create_option(
        &self,
        guild_id: GuildId,
        option: SelectOption,
    ) -> RoleToolsResult<SelectOption> {
        let option = SelectOption {
            name: normalize_name(&option.name)?,
            label: truncate(option.label, MAX_LABEL_LENGTH),
            description: truncate(option.description, MAX_LABEL_LENGTH),
            ..option
        };

        let mut guild = self.entry(guild_id)?;
        let mut role_updates = Vec::new();

        // Replacing an option that pointed at another role moves it off that role's index
        if let Some(previous) = guild.select_options.get(&option.name) {
            if previous.role_id != option.role_id {
                if let Some(mut old_role) = guild.roles.get(&previous.role_id).cloned() {
                    old_role.select_options.retain(|n| n != &option.name);
                    role_updates.push((previous.role_id, old_role));
                }
            }
        }

        let mut role = guild.roles.get(&option.role_id).cloned().unwrap_or_default();
        if !role.select_options.contains(&option.name) {
            role.select_options.push(option.name.clone());
        }
        role_updates.push((option.role_id, role));

        self.store.save_select_option(guild_id, &option)?;
        for (role_id, role) in &role_updates {
            self.store.save_role(guild_id, *role_id, role)?;
        }

        guild
            .select_options
            .insert(option.name.clone(), option.clone());
        for (role_id, role) in role_updates {
            guild.roles.insert(role_id, role);
        }
        Ok(option)
    }

    /// Deletes an option, pruning it from its role's reverse index and from every menu.
    pub fn delete_option(&self, guild_id: GuildId, name: &str) -> RoleToolsResult<SelectOption> {
        let name = name.trim().to_lowercase();
        let mut guild = self.entry(guild_id)?;
        let option = guild
            .select_options
            .get(&name)
            .cloned()
            .ok_or_else(|| RoleToolsError::OptionNotFound(name.clone()))?;

        let role = guild.roles.get(&option.role_id).cloned().map(|mut role| {
            role.select_options.retain(|n| n != &name);
            role
        });
        let menus: Vec<SelectMenu> = guild
            .select_menus
            .values()
            .filter(|menu| menu.options.contains(&name))
            .cloned()
            .map(|mut menu| {
                menu.options.retain(|n| n != &name);
                menu
            })
            .collect();

        self.store.delete_select_option(guild_id, &name)?;
        if let Some(role) = &role {
            self.store.save_role(guild_id, option.role_id, role)?;
        }
        for menu in &menus {
            self.store.save_select_menu(guild_id, menu)?;
        }

        guild.select_options.remove(&name);
        if let Some(role) = role {
            guild.roles.insert(option.role_id, role);
        }
        for menu in menus {
            guild.select_menus.insert(menu.name.clone(), menu);
        }
        Ok(option)
    }

    /// Creates or replaces a select menu. A replaced menu keeps its list of sent messages.
    pub fn create_menu(&self, guild_id: GuildId, new: NewMenu) -> RoleToolsResult<SelectMenu> {
        let name = normalize_name(&new.name)?;
        if new.options.is_empty() {
            return Err(RoleToolsError::NoOptions);
        }

        let mut guild = self.entry(guild_id)?;

        let mut options: Vec<String> = Vec::with_capacity(new.options.len());
        for option in &new.options {
            let option = option.trim().to_lowercase();
            if !guild.select_options.contains_key(&option) {
                return Err(RoleToolsError::OptionNotFound(option));
            }
            if !options.contains(&option) {
                options.push(option);
            }
        }
        if options.len() > MAX_SELECT_VALUES as usize {
            return Err(RoleToolsError::TooManyOptions);
        }

        let max_values = clamp_values(new.max_values.unwrap_or(options.len() as i64));
        let min_values = clamp_values(new.min_values.unwrap_or(1)).min(max_values);
        let messages = guild
            .select_menus
            .get(&name)
            .map(|menu| menu.messages.clone())
            .unwrap_or_default();

        let menu = SelectMenu {
            name: name.clone(),
            options,
            min_values,
            max_values,
            placeholder: truncate(new.placeholder, MAX_LABEL_LENGTH),
            messages,
        };

        self.store.save_select_menu(guild_id, &menu)?;
        guild.select_menus.insert(name, menu.clone());
        Ok(menu)
    }

    pub fn delete_menu(&self, guild_id: GuildId, name: &str) -> RoleToolsResult<SelectMenu> {
        let name = name.trim().to_lowercase();
        let mut guild = self.entry(guild_id)?;
        if !guild.select_menus.contains_key(&name) {
            return Err(RoleToolsError::MenuNotFound(name));
        }

        self.store.delete_select_menu(guild_id, &name)?;
        guild
            .select_menus
            .remove(&name)
            .ok_or(RoleToolsError::MenuNotFound(name))
    }

    /// Remembers that the menu was rendered into a message. Recording the same message twice is a no-op.
    pub fn record_menu_message(
        &self,
        guild_id: GuildId,
        name: &str,
        message: MessageKey,
    ) -> RoleToolsResult<()> {
        let name = name.trim().to_lowercase();
        let mut guild = self.entry(guild_id)?;
        let mut menu = guild
            .select_menus
            .get(&name)
            .cloned()
            .ok_or_else(|| RoleToolsError::MenuNotFound(name.clone()))?;
        if menu.messages.contains(&message) {
            return Ok(());
        }
        menu.messages.push(message);

        self.store.save_select_menu(guild_id, &menu)?;
        guild.select_menus.insert(name, menu);
        Ok(())
    }

    /// Resolves a menu's option names into renderable options.
    /// Options that no longer exist are skipped with a warning.
    pub fn render_menu(&self, guild_id: GuildId, name: &str) -> RoleToolsResult<RenderedMenu> {
        let name = name.trim().to_lowercase();
        let guild = self.entry(guild_id)?;
        let menu = guild
            .select_menus
            .get(&name)
            .ok_or_else(|| RoleToolsError::MenuNotFound(name.clone()))?;

        let mut options = Vec::with_capacity(menu.options.len());
        for option_name in &menu.options {
            let Some(option) = guild.select_options.get(option_name) else {
                warn!(
                    "Select menu `{}` in guild {} references missing option `{}`",
                    name, guild_id, option_name
                );
                continue;
            };
            options.push(RenderedOption {
                name: option.name.clone(),
                value: option_value(&option.name, option.role_id),
                label: option
                    .label
                    .clone()
                    .unwrap_or_else(|| option.name.clone()),
                description: option.description.clone(),
                emoji: option.emoji.clone(),
            });
        }

        let max_values = menu.max_values.min(options.len() as u8);
        Ok(RenderedMenu {
            name: menu.name.clone(),
            custom_id: menu_custom_id(&menu.name, guild_id),
            min_values: menu.min_values.min(max_values),
            max_values,
            placeholder: menu.placeholder.clone(),
            options,
        })
    }

    pub fn menu_names(&self, guild_id: GuildId) -> RoleToolsResult<Vec<String>> {
        Ok(self.entry(guild_id)?.select_menus.keys().cloned().collect())
    }

    pub fn option_names(&self, guild_id: GuildId) -> RoleToolsResult<Vec<String>> {
        Ok(self.entry(guild_id)?.select_options.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::database::Database;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn guild() -> GuildId {
        GuildId::new(1000)
    }

    fn cache() -> SettingsCache {
        SettingsCache::new(Arc::new(Database::open_in_memory().unwrap()))
    }

    fn option(name: &str, role: u64) -> SelectOption {
        SelectOption {
            name: name.to_string(),
            role_id: RoleId::new(role),
            label: None,
            description: None,
            emoji: None,
        }
    }

    fn menu(name: &str, options: &[&str]) -> NewMenu {
        NewMenu {
            name: name.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_toggling_a_flag_twice_restores_it() {
        let cache = cache();
        let role = RoleId::new(5);
        let original = cache.role(guild(), role).unwrap().selfassignable;

        let previous = cache
            .set_role_flag(guild(), role, RoleFlag::SelfAssignable, !original)
            .unwrap();
        assert_eq!(previous, original);
        cache
            .set_role_flag(guild(), role, RoleFlag::SelfAssignable, original)
            .unwrap();

        assert_eq!(cache.role(guild(), role).unwrap().selfassignable, original);
    }

    #[test]
    fn test_cost_at_or_below_zero_clears_it() {
        let cache = cache();
        let role = RoleId::new(5);
        assert_eq!(cache.set_role_cost(guild(), role, Some(100)).unwrap(), Some(100));
        assert_eq!(cache.set_role_cost(guild(), role, Some(0)).unwrap(), None);
        assert_eq!(cache.set_role_cost(guild(), role, Some(-4)).unwrap(), None);
    }

    #[test]
    fn test_max_values_defaults_to_option_count() {
        let cache = cache();
        for (i, name) in ["a", "b", "c"].iter().enumerate() {
            cache.create_option(guild(), option(name, i as u64 + 1)).unwrap();
        }
        let created = cache.create_menu(guild(), menu("Colours", &["a", "B", "c"])).unwrap();
        assert_eq!(created.name, "colours");
        assert_eq!(created.max_values, 3);
        assert_eq!(created.min_values, 1);
    }

    #[test]
    fn test_explicit_values_are_clamped() {
        let cache = cache();
        cache.create_option(guild(), option("a", 1)).unwrap();
        let created = cache
            .create_menu(
                guild(),
                NewMenu {
                    min_values: Some(30),
                    max_values: Some(99),
                    ..menu("m", &["a"])
                },
            )
            .unwrap();
        assert_eq!(created.max_values, 25);
        assert_eq!(created.min_values, 25);

        let rendered = cache.render_menu(guild(), "m").unwrap();
        assert_eq!(rendered.max_values, 1);
        assert_eq!(rendered.min_values, 1);
    }

    #[test]
    fn test_menu_requires_existing_options() {
        let cache = cache();
        assert_matches!(
            cache.create_menu(guild(), menu("m", &[])),
            Err(RoleToolsError::NoOptions)
        );
        assert_matches!(
            cache.create_menu(guild(), menu("m", &["ghost"])),
            Err(RoleToolsError::OptionNotFound(name)) if name == "ghost"
        );
    }

    #[test]
    fn test_deleted_option_disappears_from_menus_and_role_index() {
        let cache = cache();
        let role = RoleId::new(77);
        cache.create_option(guild(), option("vip", 77)).unwrap();
        cache.create_option(guild(), option("member", 78)).unwrap();
        cache
            .create_menu(guild(), menu("tier", &["vip", "member"]))
            .unwrap();
        assert_eq!(cache.role(guild(), role).unwrap().select_options, vec!["vip"]);

        cache.delete_option(guild(), "VIP").unwrap();

        let settings = cache.guild(guild()).unwrap();
        assert_eq!(settings.select_menus["tier"].options, vec!["member"]);
        assert!(cache.role(guild(), role).unwrap().select_options.is_empty());

        let rendered = cache.render_menu(guild(), "tier").unwrap();
        let names: Vec<_> = rendered.options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["member"]);
    }

    #[test]
    fn test_render_skips_options_missing_from_storage() {
        let cache = cache();
        cache.create_option(guild(), option("vip", 42)).unwrap();
        cache.create_menu(guild(), menu("tier", &["vip"])).unwrap();

        // Simulate a record that vanished without the menu being pruned
        cache.guilds.get_mut(&guild()).unwrap().select_options.clear();

        let rendered = cache.render_menu(guild(), "tier").unwrap();
        assert!(rendered.options.is_empty());
        assert_eq!(rendered.max_values, 0);
    }

    #[test]
    fn test_recreating_a_menu_keeps_its_messages() {
        let cache = cache();
        cache.create_option(guild(), option("a", 1)).unwrap();
        cache.create_menu(guild(), menu("m", &["a"])).unwrap();
        let key: MessageKey = "10-20".parse().unwrap();
        cache.record_menu_message(guild(), "m", key).unwrap();
        cache.record_menu_message(guild(), "m", key).unwrap();

        let recreated = cache.create_menu(guild(), menu("m", &["a"])).unwrap();
        assert_eq!(recreated.messages, vec![key]);
    }

    #[test]
    fn test_replacing_an_option_moves_the_role_index() {
        let cache = cache();
        cache.create_option(guild(), option("vip", 1)).unwrap();
        cache.create_option(guild(), option("vip", 2)).unwrap();
        assert!(cache.role(guild(), RoleId::new(1)).unwrap().select_options.is_empty());
        assert_eq!(
            cache.role(guild(), RoleId::new(2)).unwrap().select_options,
            vec!["vip"]
        );
    }

    #[test]
    fn test_option_text_is_truncated() {
        let cache = cache();
        let created = cache
            .create_option(
                guild(),
                SelectOption {
                    label: Some("x".repeat(150)),
                    description: Some("y".repeat(101)),
                    ..option("long", 1)
                },
            )
            .unwrap();
        assert_eq!(created.label.unwrap().len(), 100);
        assert_eq!(created.description.unwrap().len(), 100);
    }

    #[test]
    fn test_names_are_validated() {
        assert_eq!(normalize_name("  Red ").unwrap(), "red");
        assert_matches!(normalize_name("two words"), Err(RoleToolsError::InvalidName(_)));
        assert_matches!(normalize_name(""), Err(RoleToolsError::InvalidName(_)));
        assert_matches!(normalize_name(&"a".repeat(71)), Err(RoleToolsError::NameTooLong));
    }

    #[test]
    fn test_guild_is_loaded_from_store_once() {
        let mut store = MockSettingsStore::new();
        store
            .expect_load_guild()
            .times(1)
            .returning(|_| Ok(GuildSettings::default()));
        let cache = SettingsCache::new(Arc::new(store));

        cache.role(guild(), RoleId::new(1)).unwrap();
        cache.auto_roles(guild()).unwrap();
        cache.menu_names(guild()).unwrap();
    }

    #[test]
    fn test_failed_write_leaves_mirror_untouched() {
        let mut store = MockSettingsStore::new();
        store
            .expect_load_guild()
            .returning(|_| Ok(GuildSettings::default()));
        store
            .expect_save_role()
            .returning(|_, _, _| Err(DbError::Poisoned));
        let cache = SettingsCache::new(Arc::new(store));

        let result = cache.set_role_flag(guild(), RoleId::new(1), RoleFlag::Sticky, true);
        assert_matches!(result, Err(RoleToolsError::Storage(DbError::Poisoned)));
        assert!(!cache.role(guild(), RoleId::new(1)).unwrap().sticky);
    }

    #[test]
    fn test_sticky_roles_filters_by_flag() {
        let cache = cache();
        cache
            .set_role_flag(guild(), RoleId::new(2), RoleFlag::Sticky, true)
            .unwrap();
        let sticky = cache
            .sticky_roles(guild(), &[RoleId::new(1), RoleId::new(2), RoleId::new(3)])
            .unwrap();
        assert_eq!(sticky, vec![RoleId::new(2)]);
    }
}
