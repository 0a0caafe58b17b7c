// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod dictionary;
pub mod error;
pub mod game;
pub mod leaderboard;
pub mod limit;
pub mod matching;
pub mod protocol;
pub mod store;
pub mod text;
pub mod types;
