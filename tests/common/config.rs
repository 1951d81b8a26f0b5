//! Test configuration pointing every transport at one mock server

use nuget_assembly::Config;
use nuget_assembly::config::StoreConfig;
use tempfile::TempDir;
use wiremock::MockServer;

/// Path of the catalog index on the mock server
pub const INDEX_PATH: &str = "/v3/catalog0/index.json";

/// Path of the flat container on the mock server
pub const FLAT_CONTAINER_PATH: &str = "/v3-flatcontainer";

/// Path of the queue endpoint on the mock server
pub const QUEUE_PATH: &str = "/queues/packages";

/// Config whose catalog, packages and queue live on `server`, with the
/// content store and cursor database inside `dir`
pub fn mock_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.catalog.index_url = format!("{}{INDEX_PATH}", server.uri());
    config.catalog.package_base_url = format!("{}{FLAT_CONTAINER_PATH}", server.uri());
    config.queue.endpoint = Some(format!("{}{QUEUE_PATH}", server.uri()));
    config.store = StoreConfig::Filesystem {
        root: dir.path().join("store"),
    };
    config.persistence.database_path = dir.path().join("cursor.db");
    config.pool.concurrency = 4;
    config
}
