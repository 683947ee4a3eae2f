use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;

use crate::config::AppConfig;
use crate::fill::Generator;
use crate::output::OutputDir;
use crate::perception::{CommandRunner, PerceptionChain, SystemCommandRunner};
use crate::table::{Table, TableError};

/// Shared state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub template_cache: Cache<PathBuf, Arc<Vec<u8>>>,
    pub command_runner: Arc<dyn CommandRunner>,
    /// Held for the duration of a batch or an output clear.
    pub batch_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self::with_runner(config, Arc::new(SystemCommandRunner))
    }

    pub fn with_runner(config: AppConfig, command_runner: Arc<dyn CommandRunner>) -> Self {
        let template_cache = Cache::builder()
            .time_to_live(Duration::from_secs(5 * 60))
            .max_capacity(4)
            .build();

        Self {
            config: Arc::new(config),
            template_cache,
            command_runner,
            batch_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    /// Template bytes, read from disk at most once per cache period.
    pub async fn template_bytes(&self) -> Result<Arc<Vec<u8>>, Arc<std::io::Error>> {
        let path = self.config.form_path.clone();
        self.template_cache
            .try_get_with(path.clone(), async move {
                log::debug!("Reading template {}", path.display());
                tokio::fs::read(&path).await.map(Arc::new)
            })
            .await
    }

    pub fn output_dir(&self) -> OutputDir {
        OutputDir::new(self.config.output_dir.clone())
    }

    pub fn perception_chain(&self) -> PerceptionChain {
        if self.config.ocr_enabled {
            PerceptionChain::standard(self.command_runner.clone(), self.config.ocr_tools.clone())
        } else {
            PerceptionChain::text_layer_only()
        }
    }

    pub fn generator(&self, template: Arc<Vec<u8>>) -> Generator {
        Generator::new(template, self.output_dir(), self.perception_chain())
            .with_prefix(self.config.output_prefix.clone())
    }

    pub async fn load_table(&self) -> Result<Table, TableError> {
        Table::load(&self.config.table_path).await
    }
}
