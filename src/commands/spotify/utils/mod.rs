pub mod auth;
pub mod embedded_messages;
pub mod models;
pub mod pagination;
pub mod reaction_handlers;
pub mod spotify_api;
pub mod uri;
