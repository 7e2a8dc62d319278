#[allow(clippy::module_inception)]
pub mod error;
pub mod resource;

pub use error::CliError;
pub use resource::ResourceError;
