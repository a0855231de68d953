use std::path::PathBuf;

use crate::error::Result;


/// Directory holding the engine configuration.
///
/// [`crate::config::Config`] reads and writes `engines.toml` inside of it.
pub trait Location {
    /// Directory path, may not exist yet.
    fn root(&self) -> PathBuf;

    /// Check if the directory is present.
    fn exists(&self) -> bool;

    /// Creates the directory with its parents if missing.
    fn create_if_absent(&self) -> Result<()>;
}
