use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::OnceCell;

use soultrace_cli::Config;
use soultrace_task_store::TaskStore;

pub struct CliContext {
    config: Arc<Config>,
    config_path: PathBuf,
    store: OnceCell<Arc<dyn TaskStore>>,
}

impl CliContext {
    pub fn new(config: Config, config_path: PathBuf) -> Self {
        Self {
            config: Arc::new(config),
            config_path,
            store: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Task store for the configured backend, opened on first use.
    pub async fn store(&self) -> Result<Arc<dyn TaskStore>> {
        self.store
            .get_or_try_init(|| async {
                soultrace_task_store::open(&self.config.storage).with_context(|| {
                    format!(
                        "opening {:?} task store at {}",
                        self.config.storage.backend,
                        self.config.storage.root.display()
                    )
                })
            })
            .await
            .map(Arc::clone)
    }
}
