//! chainkit-cli library, exposed for integration tests.

pub mod app;
pub mod commands;
pub mod render;
