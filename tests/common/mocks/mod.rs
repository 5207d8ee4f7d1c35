//! Mock implementations for the storage seams.

use mockall::mock;
use poise::serenity_prelude::{GuildId, RoleId};

use rusty_cogs::commands::roletools::utils::{
    models::{GuildSettings, RoleSettings, SelectMenu, SelectOption},
    settings_cache::SettingsStore,
};
use rusty_cogs::utils::database::{DbError, DbResult};

mock! {
    pub Store {}

    impl SettingsStore for Store {
        fn load_guild(&self, guild_id: GuildId) -> DbResult<GuildSettings>;
        fn guild_ids(&self) -> DbResult<Vec<GuildId>>;
        fn save_role(&self, guild_id: GuildId, role_id: RoleId, role: &RoleSettings) -> DbResult<()>;
        fn save_select_option(&self, guild_id: GuildId, option: &SelectOption) -> DbResult<()>;
        fn delete_select_option(&self, guild_id: GuildId, name: &str) -> DbResult<()>;
        fn save_select_menu(&self, guild_id: GuildId, menu: &SelectMenu) -> DbResult<()>;
        fn delete_select_menu(&self, guild_id: GuildId, name: &str) -> DbResult<()>;
    }
}

/// A store that loads empty guilds and accepts every write.
pub fn accepting_store() -> MockStore {
    let mut store = MockStore::new();
    store
        .expect_load_guild()
        .returning(|_| Ok(GuildSettings::default()));
    store.expect_save_role().returning(|_, _, _| Ok(()));
    store.expect_save_select_option().returning(|_, _| Ok(()));
    store.expect_delete_select_option().returning(|_, _| Ok(()));
    store.expect_save_select_menu().returning(|_, _| Ok(()));
    store.expect_delete_select_menu().returning(|_, _| Ok(()));
    store
}

pub fn write_failure() -> DbError {
    DbError::Poisoned
}
