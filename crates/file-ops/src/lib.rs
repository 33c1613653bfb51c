//! File operations on an EV3 brick.
//!
//! Path composition, directory management, program start, compile-and-download
//! and the [`Explorer`] session that ties them together over short-lived
//! connections.

mod deploy;
mod dirs;
mod error;
mod explorer;
mod path;
mod program;

#[cfg(test)]
mod testing;

pub use deploy::{Compiler, IMAGE_EXTENSION, SourceKind, target_name};
pub use dirs::{create_directory, delete_entry};
pub use error::ExplorerError;
pub use explorer::{Connector, Explorer};
pub use path::{BrickPath, validate_leaf};
pub use program::run_program;
