//! Configuration loading and validation.
//!
//! Settings come from a TOML file merged with `COLOPHON_`-prefixed
//! environment variables (`__` separates sections, so
//! `COLOPHON_DATABASE__PATH` overrides `[database] path`). Defaults fill
//! everything else, and validation is deferred until an operation actually
//! needs a value.

pub mod error;

use std::path::PathBuf;

use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

pub use crate::error::{Error, ErrorKind, Result};

const ENV_PREFIX: &str = "COLOPHON_";
const SECTION_SEPARATOR: &str = "__";
const CONFIG_FILE_NAME: &str = "colophon.toml";

/// Which relational backend holds the catalog.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Sqlite,
    Mysql,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: Backend,
    /// SQLite database file.
    pub path: PathBuf,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    /// MySQL unix socket; takes precedence over host/port when set.
    pub socket: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Sqlite,
            path: PathBuf::from("colophon.db"),
            host: String::new(),
            port: 3306,
            user: String::new(),
            password: String::new(),
            database: String::new(),
            socket: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub books_dir: PathBuf,
    pub use_inpx: bool,
    pub inpx_path: PathBuf,
    /// `blake3` or `sha256`.
    pub hash_algorithm: String,
    pub max_entry_size: u64,
    pub max_entries_per_archive: usize,
    pub enumeration_timeout_secs: u64,
    pub description_limit: usize,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            books_dir: PathBuf::new(),
            use_inpx: false,
            inpx_path: PathBuf::new(),
            hash_algorithm: "blake3".to_owned(),
            max_entry_size: 100 * 1024 * 1024,
            max_entries_per_archive: 10_000,
            enumeration_timeout_secs: 30,
            description_limit: 1000,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub scanner: ScannerConfig,
}

impl Config {
    /// Loads defaults, then the TOML file at `path` (or the per-user
    /// config file when `None`), then environment overrides.
    pub fn load(path: Option<&std::path::Path>) -> Result<Self> {
        let path = path.map(PathBuf::from).or_else(default_config_path);
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            tracing::debug!(path = %path.display(), "loading configuration file");
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split(SECTION_SEPARATOR))
            .extract()
            .or_raise(|| ErrorKind::Load)
    }

    /// Checks the values a scan needs.
    pub fn validate_for_scan(&self) -> Result<()> {
        if self.scanner.books_dir.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid { reason: "scanner.books_dir is not set".to_owned() });
        }
        if self.scanner.use_inpx && self.scanner.inpx_path.as_os_str().is_empty() {
            exn::bail!(ErrorKind::Invalid {
                reason: "scanner.use_inpx is set but scanner.inpx_path is empty".to_owned(),
            });
        }
        self.validate_database()
    }

    /// Checks the values any catalog connection needs.
    pub fn validate_database(&self) -> Result<()> {
        if self.database.backend == Backend::Mysql {
            if self.database.host.is_empty() && self.database.socket.is_none() {
                exn::bail!(ErrorKind::Invalid {
                    reason: "mysql backend requires database.host or database.socket".to_owned(),
                });
            }
            if self.database.database.is_empty() {
                exn::bail!(ErrorKind::Invalid {
                    reason: "mysql backend requires database.database".to_owned(),
                });
            }
        }
        Ok(())
    }
}

fn default_config_path() -> Option<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "colophon")?;
    let path = dirs.config_dir().join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::io::Write;

    fn load_toml(text: &str) -> Config {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file.flush().unwrap();
        Config::load(Some(file.path())).unwrap()
    }

    #[test]
    fn defaults_are_sane() {
        let config = Config::default();
        assert_eq!(config.database.backend, Backend::Sqlite);
        assert_eq!(config.scanner.max_entry_size, 104_857_600);
        assert_eq!(config.scanner.max_entries_per_archive, 10_000);
        assert_eq!(config.scanner.enumeration_timeout_secs, 30);
        assert_eq!(config.scanner.description_limit, 1000);
        assert_eq!(config.scanner.hash_algorithm, "blake3");
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let config = load_toml(
            r#"
            [database]
            backend = "mysql"
            host = "db.local"
            database = "books"

            [scanner]
            books_dir = "/library"
            description_limit = 500
            "#,
        );
        assert_eq!(config.database.backend, Backend::Mysql);
        assert_eq!(config.database.host, "db.local");
        assert_eq!(config.scanner.books_dir, PathBuf::from("/library"));
        assert_eq!(config.scanner.description_limit, 500);
        // Untouched values keep their defaults.
        assert_eq!(config.database.port, 3306);
    }

    #[test]
    fn scan_validation_requires_a_books_dir() {
        let config = Config::default();
        let err = config.validate_for_scan().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { .. }));

        let config = load_toml("[scanner]\nbooks_dir = \"/library\"\n");
        config.validate_for_scan().unwrap();
    }

    #[test]
    fn inpx_mode_requires_a_path() {
        let config = load_toml("[scanner]\nbooks_dir = \"/library\"\nuse_inpx = true\n");
        assert!(config.validate_for_scan().is_err());

        let config =
            load_toml("[scanner]\nbooks_dir = \"/library\"\nuse_inpx = true\ninpx_path = \"/library/i.inpx\"\n");
        config.validate_for_scan().unwrap();
    }

    #[rstest]
    #[case::bare("", false)]
    #[case::host_only("host = \"db\"\n", false)]
    #[case::database_only("database = \"books\"\n", false)]
    #[case::host_and_database("host = \"db\"\ndatabase = \"books\"\n", true)]
    #[case::socket_satisfies_host("socket = \"/run/mysqld.sock\"\ndatabase = \"books\"\n", true)]
    fn mysql_backend_requires_host_and_database(#[case] extra: &str, #[case] valid: bool) {
        let config = load_toml(&format!("[database]\nbackend = \"mysql\"\n{extra}"));
        assert_eq!(config.validate_database().is_ok(), valid);
    }
}
