//! Provides the application's SQLite database.
//! Handles initialization, table creation, and CRUD operations for guild role settings,
//! sticky roles kept across rejoins, and per-user Spotify sessions.

use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[cfg(any(feature = "roletools", feature = "spotify"))]
use tracing::warn;

#[cfg(feature = "roletools")]
use {
    crate::commands::roletools::utils::{
        models::{GuildSettings, MessageKey, RoleSettings, SelectMenu, SelectOption},
        settings_cache::SettingsStore,
    },
    poise::serenity_prelude::{GuildId, RoleId, UserId},
};

#[cfg(feature = "spotify")]
use crate::commands::spotify::utils::{auth::Token, uri::ReactionAction};

/// The default filename for the SQLite database.
pub const APPDATA_DB: &str = "application_data.db";

/// Errors raised by the persisted store.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed stored value: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database connection lock was poisoned")]
    Poisoned,
}

pub type DbResult<T> = Result<T, DbError>;

/// Handle to the SQLite database. Cheap to clone; every clone shares one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file and makes sure every table exists.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database, used by tests.
    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with exclusive access to the connection. Never hold this across an `.await`.
    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> DbResult<T>) -> DbResult<T> {
        let conn = self.conn.lock().map_err(|_| DbError::Poisoned)?;
        f(&conn)
    }
}

/// Creates the database tables if they don't exist.
fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS role_settings (
            guild_id INTEGER NOT NULL,
            role_id INTEGER NOT NULL,
            selfassignable BOOLEAN NOT NULL DEFAULT 0,
            selfremovable BOOLEAN NOT NULL DEFAULT 0,
            sticky BOOLEAN NOT NULL DEFAULT 0,
            auto BOOLEAN NOT NULL DEFAULT 0,
            cost INTEGER,
            select_options TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (guild_id, role_id)
        );
        CREATE TABLE IF NOT EXISTS select_options (
            guild_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            role_id INTEGER NOT NULL,
            label TEXT,
            description TEXT,
            emoji TEXT,
            PRIMARY KEY (guild_id, name)
        );
        CREATE TABLE IF NOT EXISTS select_menus (
            guild_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            options TEXT NOT NULL,
            min_values INTEGER NOT NULL,
            max_values INTEGER NOT NULL,
            placeholder TEXT,
            messages TEXT NOT NULL DEFAULT '[]',
            PRIMARY KEY (guild_id, name)
        );
        CREATE TABLE IF NOT EXISTS sticky_members (
            guild_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            role_ids TEXT NOT NULL,
            PRIMARY KEY (guild_id, user_id)
        );
        CREATE TABLE IF NOT EXISTS spotify_users (
            user_id INTEGER PRIMARY KEY,
            token TEXT,
            listen_for TEXT NOT NULL DEFAULT '[]',
            show_private BOOLEAN NOT NULL DEFAULT 0
        );",
    )
}

/// Snowflakes are stored as SQLite integers.
#[cfg(any(feature = "roletools", feature = "spotify"))]
fn sql_id(id: u64) -> i64 {
    id as i64
}

/// Raw `select_menus` row before its JSON columns are decoded.
#[cfg(feature = "roletools")]
struct MenuRow {
    name: String,
    options: String,
    min_values: u8,
    max_values: u8,
    placeholder: Option<String>,
    messages: String,
}

#[cfg(feature = "roletools")]
impl MenuRow {
    fn decode(self) -> DbResult<SelectMenu> {
        Ok(SelectMenu {
            name: self.name,
            options: serde_json::from_str(&self.options)?,
            min_values: self.min_values,
            max_values: self.max_values,
            placeholder: self.placeholder,
            messages: serde_json::from_str::<Vec<MessageKey>>(&self.messages)?,
        })
    }
}

#[cfg(feature = "roletools")]
impl SettingsStore for Database {
    /// Loads every role setting, select option and select menu stored for the guild.
    /// Rows whose JSON columns can't be decoded are skipped with a warning.
    fn load_guild(&self, guild_id: GuildId) -> DbResult<GuildSettings> {
        self.with_conn(|conn| {
            let guild = sql_id(guild_id.get());
            let mut settings = GuildSettings::default();

            // Role settings
            let mut stmt = conn.prepare(
                "SELECT role_id, selfassignable, selfremovable, sticky, auto, cost, select_options
                 FROM role_settings WHERE guild_id = ?1",
            )?;
            let rows = stmt.query_map([guild], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    RoleSettings {
                        selfassignable: row.get(1)?,
                        selfremovable: row.get(2)?,
                        sticky: row.get(3)?,
                        auto: row.get(4)?,
                        cost: row.get::<_, Option<i64>>(5)?.map(|c| c.max(0) as u64),
                        select_options: Vec::new(),
                    },
                    row.get::<_, String>(6)?,
                ))
            })?;
            for row in rows {
                let (role_id, mut role, options) = row?;
                match serde_json::from_str(&options) {
                    Ok(options) => role.select_options = options,
                    Err(e) => warn!(
                        "Ignoring malformed select option index for role {} in guild {}: {}",
                        role_id, guild_id, e
                    ),
                }
                settings.roles.insert(RoleId::new(role_id as u64), role);
            }

            // Select options
            let mut stmt = conn.prepare(
                "SELECT name, role_id, label, description, emoji
                 FROM select_options WHERE guild_id = ?1",
            )?;
            let rows = stmt.query_map([guild], |row| {
                Ok(SelectOption {
                    name: row.get(0)?,
                    role_id: RoleId::new(row.get::<_, i64>(1)? as u64),
                    label: row.get(2)?,
                    description: row.get(3)?,
                    emoji: row.get(4)?,
                })
            })?;
            for option in rows {
                let option = option?;
                settings.select_options.insert(option.name.clone(), option);
            }

            // Select menus
            let mut stmt = conn.prepare(
                "SELECT name, options, min_values, max_values, placeholder, messages
                 FROM select_menus WHERE guild_id = ?1",
            )?;
            let rows = stmt.query_map([guild], |row| {
                Ok(MenuRow {
                    name: row.get(0)?,
                    options: row.get(1)?,
                    min_values: row.get(2)?,
                    max_values: row.get(3)?,
                    placeholder: row.get(4)?,
                    messages: row.get(5)?,
                })
            })?;
            for row in rows {
                let row = row?;
                let name = row.name.clone();
                match row.decode() {
                    Ok(menu) => {
                        settings.select_menus.insert(name, menu);
                    }
                    Err(e) => warn!(
                        "Skipping malformed select menu `{}` in guild {}: {}",
                        name, guild_id, e
                    ),
                }
            }

            Ok(settings)
        })
    }

    fn guild_ids(&self) -> DbResult<Vec<GuildId>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT guild_id FROM role_settings
                 UNION SELECT guild_id FROM select_options
                 UNION SELECT guild_id FROM select_menus",
            )?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(ids
                .into_iter()
                .map(|id| GuildId::new(id as u64))
                .collect())
        })
    }

    fn save_role(&self, guild_id: GuildId, role_id: RoleId, role: &RoleSettings) -> DbResult<()> {
        let options = serde_json::to_string(&role.select_options)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO role_settings
                 (guild_id, role_id, selfassignable, selfremovable, sticky, auto, cost, select_options)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    sql_id(guild_id.get()),
                    sql_id(role_id.get()),
                    role.selfassignable,
                    role.selfremovable,
                    role.sticky,
                    role.auto,
                    role.cost.map(|c| c.min(i64::MAX as u64) as i64),
                    options,
                ],
            )?;
            Ok(())
        })
    }

    fn save_select_option(&self, guild_id: GuildId, option: &SelectOption) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO select_options
                 (guild_id, name, role_id, label, description, emoji)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    sql_id(guild_id.get()),
                    option.name,
                    sql_id(option.role_id.get()),
                    option.label,
                    option.description,
                    option.emoji,
                ],
            )?;
            Ok(())
        })
    }

    fn delete_select_option(&self, guild_id: GuildId, name: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM select_options WHERE guild_id = ?1 AND name = ?2",
                params![sql_id(guild_id.get()), name],
            )?;
            Ok(())
        })
    }

    fn save_select_menu(&self, guild_id: GuildId, menu: &SelectMenu) -> DbResult<()> {
        let options = serde_json::to_string(&menu.options)?;
        let messages = serde_json::to_string(&menu.messages)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO select_menus
                 (guild_id, name, options, min_values, max_values, placeholder, messages)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    sql_id(guild_id.get()),
                    menu.name,
                    options,
                    menu.min_values,
                    menu.max_values,
                    menu.placeholder,
                    messages,
                ],
            )?;
            Ok(())
        })
    }

    fn delete_select_menu(&self, guild_id: GuildId, name: &str) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM select_menus WHERE guild_id = ?1 AND name = ?2",
                params![sql_id(guild_id.get()), name],
            )?;
            Ok(())
        })
    }
}

#[cfg(feature = "roletools")]
impl Database {
    /// Remembers the sticky roles a member held when leaving. An empty list forgets the member.
    pub fn save_sticky_roles(
        &self,
        guild_id: GuildId,
        user_id: UserId,
        roles: &[RoleId],
    ) -> DbResult<()> {
        let guild = sql_id(guild_id.get());
        let user = sql_id(user_id.get());
        if roles.is_empty() {
            return self.with_conn(|conn| {
                conn.execute(
                    "DELETE FROM sticky_members WHERE guild_id = ?1 AND user_id = ?2",
                    params![guild, user],
                )?;
                Ok(())
            });
        }

        let role_ids = serde_json::to_string(&roles.iter().map(|r| r.get()).collect::<Vec<_>>())?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO sticky_members (guild_id, user_id, role_ids)
                 VALUES (?1, ?2, ?3)",
                params![guild, user, role_ids],
            )?;
            Ok(())
        })
    }

    /// Returns and forgets the sticky roles stored for a rejoining member.
    pub fn take_sticky_roles(&self, guild_id: GuildId, user_id: UserId) -> DbResult<Vec<RoleId>> {
        let guild = sql_id(guild_id.get());
        let user = sql_id(user_id.get());
        let stored: Option<String> = self.with_conn(|conn| {
            let stored = conn
                .query_row(
                    "SELECT role_ids FROM sticky_members WHERE guild_id = ?1 AND user_id = ?2",
                    params![guild, user],
                    |row| row.get(0),
                )
                .optional()?;
            conn.execute(
                "DELETE FROM sticky_members WHERE guild_id = ?1 AND user_id = ?2",
                params![guild, user],
            )?;
            Ok(stored)
        })?;

        let Some(stored) = stored else {
            return Ok(Vec::new());
        };
        let ids: Vec<u64> = serde_json::from_str(&stored)?;
        Ok(ids
            .into_iter()
            .filter(|id| *id != 0)
            .map(RoleId::new)
            .collect())
    }
}

/// Per-user Spotify settings.
#[cfg(feature = "spotify")]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpotifyUserSettings {
    pub token: Option<Token>,
    pub listen_for: Vec<ReactionAction>,
    pub show_private: bool,
}

#[cfg(feature = "spotify")]
impl Database {
    /// Retrieves a user's Spotify settings, falling back to defaults if none are stored.
    /// A token that can't be decoded is treated as absent so the user simply re-authorizes.
    pub fn get_spotify_user(&self, user_id: u64) -> DbResult<SpotifyUserSettings> {
        let row: Option<(Option<String>, String, bool)> = self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT token, listen_for, show_private FROM spotify_users WHERE user_id = ?1",
                    [sql_id(user_id)],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?)
        })?;

        let Some((token, listen_for, show_private)) = row else {
            return Ok(SpotifyUserSettings::default());
        };

        let token = match token.as_deref().map(serde_json::from_str::<Token>) {
            Some(Ok(token)) => Some(token),
            Some(Err(e)) => {
                warn!("Discarding malformed Spotify token for user {}: {}", user_id, e);
                None
            }
            None => None,
        };

        Ok(SpotifyUserSettings {
            token,
            listen_for: serde_json::from_str(&listen_for).unwrap_or_default(),
            show_private,
        })
    }

    /// Stores (or with `None`, clears) the user's token bundle, keeping their preferences.
    pub fn save_spotify_token(&self, user_id: u64, token: Option<&Token>) -> DbResult<()> {
        let token = token.map(serde_json::to_string).transpose()?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO spotify_users (user_id, token) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET token = excluded.token",
                params![sql_id(user_id), token],
            )?;
            Ok(())
        })
    }

    pub fn set_listen_for(&self, user_id: u64, listen_for: &[ReactionAction]) -> DbResult<()> {
        let listen_for = serde_json::to_string(listen_for)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO spotify_users (user_id, listen_for) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET listen_for = excluded.listen_for",
                params![sql_id(user_id), listen_for],
            )?;
            Ok(())
        })
    }

    pub fn set_show_private(&self, user_id: u64, show_private: bool) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO spotify_users (user_id, show_private) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET show_private = excluded.show_private",
                params![sql_id(user_id), show_private],
            )?;
            Ok(())
        })
    }

    /// Forgets everything stored for the user.
    pub fn clear_spotify_user(&self, user_id: u64) -> DbResult<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM spotify_users WHERE user_id = ?1", [sql_id(user_id)])?;
            Ok(())
        })
    }
}

/// Module containing tests for the database.
#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Tests that opening twice over the same schema doesn't fail on existing tables.
    #[test]
    fn test_create_tables_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();
    }

    #[cfg(feature = "roletools")]
    mod roletools {
        use super::*;
        use pretty_assertions::assert_eq;
        use poise::serenity_prelude::{ChannelId, MessageId};

        fn guild() -> GuildId {
            GuildId::new(111222333)
        }

        /// Tests storing every kind of guild setting and loading the subtree back.
        #[test]
        fn test_save_and_load_guild_subtree() {
            let db = Database::open_in_memory().unwrap();
            let role_id = RoleId::new(42);
            let role = RoleSettings {
                selfassignable: true,
                cost: Some(250),
                select_options: vec!["vip".to_string()],
                ..Default::default()
            };
            let option = SelectOption {
                name: "vip".to_string(),
                role_id,
                label: Some("VIP".to_string()),
                description: None,
                emoji: Some("a:party:123".to_string()),
            };
            let menu = SelectMenu {
                name: "tier".to_string(),
                options: vec!["vip".to_string()],
                min_values: 1,
                max_values: 1,
                placeholder: Some("Pick a tier".to_string()),
                messages: vec![MessageKey::new(ChannelId::new(7), MessageId::new(8))],
            };

            db.save_role(guild(), role_id, &role).unwrap();
            db.save_select_option(guild(), &option).unwrap();
            db.save_select_menu(guild(), &menu).unwrap();

            let loaded = db.load_guild(guild()).unwrap();
            assert_eq!(loaded.roles.get(&role_id), Some(&role));
            assert_eq!(loaded.select_options.get("vip"), Some(&option));
            assert_eq!(loaded.select_menus.get("tier"), Some(&menu));
            assert_eq!(db.guild_ids().unwrap(), vec![guild()]);

            // Other guilds see nothing
            assert!(db.load_guild(GuildId::new(1)).unwrap().is_empty());
        }

        /// Tests deleting options and menus.
        #[test]
        fn test_delete_option_and_menu() {
            let db = Database::open_in_memory().unwrap();
            let option = SelectOption {
                name: "red".to_string(),
                role_id: RoleId::new(5),
                label: None,
                description: None,
                emoji: None,
            };
            db.save_select_option(guild(), &option).unwrap();
            db.delete_select_option(guild(), "red").unwrap();
            db.delete_select_menu(guild(), "missing").unwrap();
            assert!(db.load_guild(guild()).unwrap().select_options.is_empty());
        }

        /// Tests that a malformed menu row is skipped without failing the load.
        #[test]
        fn test_malformed_menu_is_skipped() {
            let db = Database::open_in_memory().unwrap();
            db.with_conn(|conn| {
                conn.execute(
                    "INSERT INTO select_menus (guild_id, name, options, min_values, max_values)
                     VALUES (?1, 'broken', 'not json', 1, 1)",
                    [sql_id(guild().get())],
                )?;
                Ok(())
            })
            .unwrap();
            let loaded = db.load_guild(guild()).unwrap();
            assert!(loaded.select_menus.is_empty());
        }

        /// Tests that sticky roles are returned once and then forgotten.
        #[test]
        fn test_sticky_roles_are_taken_once() {
            let db = Database::open_in_memory().unwrap();
            let user = UserId::new(99);
            db.save_sticky_roles(guild(), user, &[RoleId::new(1), RoleId::new(2)])
                .unwrap();
            assert_eq!(
                db.take_sticky_roles(guild(), user).unwrap(),
                vec![RoleId::new(1), RoleId::new(2)]
            );
            assert!(db.take_sticky_roles(guild(), user).unwrap().is_empty());
        }
    }

    #[cfg(feature = "spotify")]
    mod spotify {
        use super::*;
        use pretty_assertions::assert_eq;

        fn token(refresh: &str) -> Token {
            Token {
                access_token: "access".to_string(),
                refresh_token: refresh.to_string(),
                expires_at: 1_700_000_000,
                scope: "user-read-private".to_string(),
                uses_pkce: false,
                token_type: "Bearer".to_string(),
            }
        }

        /// Tests retrieving settings for a user that doesn't exist in the database.
        #[test]
        fn test_unknown_user_gets_defaults() {
            let db = Database::open_in_memory().unwrap();
            assert_eq!(db.get_spotify_user(1).unwrap(), SpotifyUserSettings::default());
        }

        /// Tests that saving and clearing a token keeps the user's preferences.
        #[test]
        fn test_token_updates_keep_preferences() {
            let db = Database::open_in_memory().unwrap();
            db.set_listen_for(7, &[ReactionAction::Like]).unwrap();
            db.set_show_private(7, true).unwrap();
            db.save_spotify_token(7, Some(&token("r1"))).unwrap();

            let user = db.get_spotify_user(7).unwrap();
            assert_eq!(user.token, Some(token("r1")));
            assert_eq!(user.listen_for, vec![ReactionAction::Like]);
            assert!(user.show_private);

            db.save_spotify_token(7, None).unwrap();
            let user = db.get_spotify_user(7).unwrap();
            assert_eq!(user.token, None);
            assert!(user.show_private);
        }

        /// Tests that forgetting a user removes every stored value.
        #[test]
        fn test_clear_user_forgets_everything() {
            let db = Database::open_in_memory().unwrap();
            db.save_spotify_token(7, Some(&token("r1"))).unwrap();
            db.set_show_private(7, true).unwrap();
            db.clear_spotify_user(7).unwrap();
            assert_eq!(db.get_spotify_user(7).unwrap(), SpotifyUserSettings::default());
        }
    }
}
