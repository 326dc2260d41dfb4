pub mod app;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod goals;
pub mod local_store;
pub mod meals;
pub mod sessions;
pub mod state;
pub mod storage;
