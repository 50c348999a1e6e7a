//! Backend selection.

use colophon_catalog::{CatalogStore, MySqlCatalog, MySqlParams, SqliteCatalog};
use colophon_config::{Backend, Config};
use exn::ResultExt;

use crate::error::{ErrorKind, Result};

/// Connects the configured catalog backend and runs its migrations.
pub async fn connect(config: &Config) -> Result<Box<dyn CatalogStore>> {
    config.validate_database().or_raise(|| ErrorKind::Config)?;
    match config.database.backend {
        Backend::Sqlite => {
            let store = SqliteCatalog::connect(&config.database.path)
                .await
                .or_raise(|| ErrorKind::Catalog)?;
            Ok(Box::new(store))
        }
        Backend::Mysql => {
            let params = MySqlParams {
                host: config.database.host.clone(),
                port: config.database.port,
                user: config.database.user.clone(),
                password: config.database.password.clone(),
                database: config.database.database.clone(),
                socket: config.database.socket.clone(),
            };
            let store = MySqlCatalog::connect(&params).await.or_raise(|| ErrorKind::Catalog)?;
            Ok(Box::new(store))
        }
    }
}
