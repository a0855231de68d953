use std::path::{Path, PathBuf};

use serde::{Serialize, Deserialize};

use crate::error::{Error, ErrorKind, Result};
use crate::location::Location;


/// Name of the configuration file inside of a location.
const CONFIG_FILE: &str = "engines.toml";


/// Per-backend settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Explicit path to the backend program.
    /// If absent, the program is looked up in `PATH`.
    #[serde(default)]
    pub file_name: Option<PathBuf>,
}


/// Library configuration, describes where backends live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// GnuPG home directory passed to every backend invocation.
    #[serde(default)]
    pub homedir: Option<PathBuf>,

    /// OpenPGP backend (`gpg`) settings.
    #[serde(default)]
    pub openpgp: BackendConfig,

    /// CMS backend (`gpgsm`) settings.
    #[serde(default)]
    pub cms: BackendConfig,
}


impl Config {
    /// Loads configuration from a location.
    ///
    /// Missing configuration file is not an error, defaults are used instead.
    ///
    /// * `loc` - configuration location provider
    pub fn open<L: Location>(loc: &L) -> Result<Self> {
        let path = Self::config_file(loc);
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no engine configuration, using defaults");
            return Ok(Config::default());
        }

        Self::from_file(&path)
    }

    /// Parses configuration from a specific file.
    ///
    /// * `path` - path to a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::with_extra(ErrorKind::Config, "Cannot read configuration file", e.to_string()))?;

        let config: Config = toml::from_str(&raw)?;
        Ok(config)
    }

    /// Stores configuration into a location, creating it if necessary.
    ///
    /// * `loc` - configuration location provider
    pub fn store<L: Location>(&self, loc: &L) -> Result<()> {
        loc.create_if_absent()?;

        let raw = toml::to_string(self)
            .map_err(|e| Error::with_extra(ErrorKind::Config, "Cannot serialize configuration", e.to_string()))?;

        std::fs::write(Self::config_file(loc), raw)
            .map_err(|e| Error::with_extra(ErrorKind::Config, "Cannot write configuration file", e.to_string()))
    }

    fn config_file<L: Location>(loc: &L) -> PathBuf {
        loc.root()
            .join(CONFIG_FILE)
    }
}


/// Looks for the first of `names` in directories listed in `PATH`.
///
/// * `names` - candidate program names in order of preference
pub(crate) fn find_program(names: &[&str]) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;

    names.iter()
        .flat_map(|name| std::env::split_paths(&path).map(move |dir| dir.join(name)))
        .find(|candidate| candidate.is_file())
}
