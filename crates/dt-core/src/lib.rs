pub mod apply;
pub mod config;
pub mod directive;
pub mod error;
pub mod gate;
pub mod io;
pub mod merge;
pub mod paths;
pub mod project;
pub mod prompt;
pub mod sanitize;
pub mod store;
pub mod summary;
pub mod types;

pub use error::{DtError, Result};
pub use project::ProjectState;
