//! The CRUD verb family: create / delete / start / stop / get / describe,
//! generated uniformly for every resource kind.

mod command;
mod verb;

pub use command::{Autocomplete, CommandOption, CompletionSource, CrudCommand};
pub use verb::CrudVerb;
