pub mod api;
pub mod cancel;
pub mod config;
pub mod crud;
pub mod error;
pub mod manager;
pub mod plugin;
pub mod resource;
pub mod task;
