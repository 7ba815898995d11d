//! Shared fixtures for the pipeline tests

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;
use schemata::{
    Command, CommandContext, CommandPipeline, Environment, Result, ServiceRegistry, SqliteStore,
    TomlFileSource,
};
use tempfile::TempDir;

/// Route engine logs to the test output
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A project directory with a config file, change files and a state store
pub struct Project {
    pub dir: TempDir,
    pub registry: Arc<ServiceRegistry>,
    pub pipeline: CommandPipeline,
}

impl Project {
    pub fn new() -> Self {
        init_tracing();
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("changes")).unwrap();
        let config = format!(
            r#"
[changes]
directory = "{root}/changes"

[lock]
timeout-millis = 50

[connectors.app]
type = "jdbc"
url = "sqlite:${{data}}/app-${{environment}}.db"

[environments.DEV]
data = "{root}"

[environments.PROD]
data = "{root}"
"#,
            root = dir.path().display()
        );
        std::fs::write(dir.path().join("schemata.toml"), config).unwrap();

        let (registry, pipeline) = Self::open(dir.path());
        Project {
            dir,
            registry,
            pipeline,
        }
    }

    /// Independent registry and pipeline over the same files, as a second process would have
    pub fn open(root: &Path) -> (Arc<ServiceRegistry>, CommandPipeline) {
        let store = SqliteStore::open(&root.join("state.db")).unwrap();
        let registry = Arc::new(ServiceRegistry::new(Arc::new(store)));
        let pipeline = CommandPipeline::standard(
            Arc::clone(&registry),
            Arc::new(TomlFileSource::new(root.join("schemata.toml"))),
        );
        (registry, pipeline)
    }

    pub fn changes(&self) -> PathBuf {
        self.dir.path().join("changes")
    }

    pub fn write_change(&self, relative: &str, sql: &str) {
        let path = self.changes().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, sql).unwrap();
    }

    pub fn run<C: Command>(&self, environment: &str, command: &C) -> Result<C::Output> {
        let ctx = CommandContext::with_environment(Environment::new(environment));
        self.pipeline.execute(&ctx, command)
    }

    /// Open the target database of `environment` for assertions
    pub fn target(&self, environment: &str) -> Connection {
        Connection::open(self.dir.path().join(format!("app-{}.db", environment))).unwrap()
    }

    /// Names of the user tables in the target database
    pub fn tables(&self, environment: &str) -> Vec<String> {
        let conn = self.target(environment);
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        names
    }
}

impl Drop for Project {
    fn drop(&mut self) {
        self.registry.close();
    }
}
