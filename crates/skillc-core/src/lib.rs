pub mod claims;
pub mod compiler;
pub mod config;
pub mod error;
pub mod finding;
pub mod gate;
pub mod io;
pub mod links;
pub mod paths;
pub mod pipeline;
pub mod registry;
pub mod rule;
pub mod skill;
pub mod structure;
pub mod types;

pub use error::{Result, SkillcError};
