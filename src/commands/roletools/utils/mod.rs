/// Handles presses on role select menus.
pub mod component_handlers;
/// Role hierarchy and verification checks.
pub mod hierarchy;
/// Auto and sticky roles on member join, update and leave.
pub mod member_events;
pub mod models;
/// Select menu component building and custom id parsing.
pub mod select_menus;
/// The in-memory mirror of stored role settings.
pub mod settings_cache;
