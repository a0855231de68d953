use crate::error::{Error, ErrorKind, Result};
use super::location::Location;


/// Root folder for library's configuration.
const ROOT_FOLDER: &str = ".gpgctx";


/// Configuration location based on current user's home directory.
///
/// Falls back to the working directory if the home directory
/// cannot be determined.
pub struct HomeLocation;


impl HomeLocation {
    /// Just creates an instance.
    pub fn new() -> Self {
        HomeLocation
    }
}


impl Default for HomeLocation {
    fn default() -> Self {
        Self::new()
    }
}


impl Location for HomeLocation {
    fn root(&self) -> std::path::PathBuf {
        dirs::home_dir()
            .unwrap_or_default()
            .join(ROOT_FOLDER)
    }

    fn exists(&self) -> bool {
        self.root()
            .exists()
    }

    fn create_if_absent(&self) -> Result<()> {
        if !self.exists() {
            std::fs::create_dir_all(self.root())
                .map_err(|e| Error::with_extra(ErrorKind::Io, "Cannot create configuration folder", e.to_string()))?;
        }

        Ok(())
    }
}
