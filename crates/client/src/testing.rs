//! In-memory [`MasterSource`] for tests.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use masterbook_core::Error;

use crate::source::{Catalog, CatalogEntry, MasterSource, Row, Version};

#[derive(Default)]
struct FakeState {
    version: String,
    tables: BTreeMap<String, (String, Vec<Row>)>,
    failing: HashSet<String>,
    table_fetches: HashMap<String, usize>,
    catalog_fetches: usize,
    version_fetches: usize,
}

/// Scriptable master-data source that counts every fetch.
#[derive(Default)]
pub struct FakeSource {
    state: Mutex<FakeState>,
    delay: Duration,
}

impl FakeSource {
    pub fn new(version: &str) -> Self {
        let source = Self::default();
        source.set_version(version);
        source
    }

    /// Sleep this long inside every table fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_version(&self, version: &str) {
        self.state.lock().unwrap().version = version.to_string();
    }

    /// Publish a table with the given hash and rows.
    pub fn set_table(&self, name: &str, hash: &str, rows: Vec<Row>) {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(name.to_string(), (hash.to_string(), rows));
    }

    /// Make fetches of `name` fail with a transport error until cleared.
    pub fn fail_table(&self, name: &str, failing: bool) {
        let mut state = self.state.lock().unwrap();
        if failing {
            state.failing.insert(name.to_string());
        } else {
            state.failing.remove(name);
        }
    }

    pub fn table_fetches(&self, name: &str) -> usize {
        self.state.lock().unwrap().table_fetches.get(name).copied().unwrap_or(0)
    }

    pub fn total_table_fetches(&self) -> usize {
        self.state.lock().unwrap().table_fetches.values().sum()
    }

    pub fn catalog_fetches(&self) -> usize {
        self.state.lock().unwrap().catalog_fetches
    }

    pub fn version_fetches(&self) -> usize {
        self.state.lock().unwrap().version_fetches
    }
}

/// Build a row from a JSON object literal.
pub fn row(value: serde_json::Value) -> Row {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

#[async_trait]
impl MasterSource for FakeSource {
    async fn fetch_version(&self) -> Result<Version, Error> {
        let mut state = self.state.lock().unwrap();
        state.version_fetches += 1;
        Ok(Version::new(state.version.clone()))
    }

    async fn fetch_catalog(&self) -> Result<Catalog, Error> {
        let mut state = self.state.lock().unwrap();
        state.catalog_fetches += 1;
        Ok(Catalog::from_entries(state.tables.iter().map(|(name, (hash, _))| CatalogEntry {
            table_name: name.clone(),
            content_hash: hash.clone(),
        })))
    }

    async fn fetch_table(&self, name: &str) -> Result<Vec<Row>, Error> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut state = self.state.lock().unwrap();
        *state.table_fetches.entry(name.to_string()).or_default() += 1;
        if state.failing.contains(name) {
            return Err(Error::HttpError(format!("{name}: status 503")));
        }
        state
            .tables
            .get(name)
            .map(|(_, rows)| rows.clone())
            .ok_or_else(|| Error::HttpError(format!("{name}: status 404")))
    }
}
