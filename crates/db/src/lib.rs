//! Session Store: durable workflow sessions and profile snapshots on SQLite.

pub mod connection;
pub mod migrations;
pub mod repositories;

pub use connection::{connect, connect_with_config, connect_with_settings, DbPool};
pub use repositories::{
    InMemoryProfileRepository, InMemorySessionRepository, ProfileRepository, RepositoryError,
    SessionRepository, SqlProfileRepository, SqlSessionRepository,
};
