use directories::ProjectDirs;
use eyre::ContextCompat as _;
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "solagent.log.jsonl";

#[derive(Debug, Clone)]
pub struct AgentPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_file: PathBuf,
}

impl AgentPaths {
    pub fn discover() -> eyre::Result<Self> {
        // Test/CI override knobs.
        if let (Ok(data_dir), Ok(config_dir)) = (
            std::env::var("SOLAGENT_DATA_DIR"),
            std::env::var("SOLAGENT_CONFIG_DIR"),
        ) {
            let data_dir = PathBuf::from(data_dir);
            let config_dir = PathBuf::from(config_dir);
            let log_file = data_dir.join(LOG_FILE_NAME);
            return Ok(Self {
                config_dir,
                data_dir,
                log_file,
            });
        }

        // macOS: ~/Library/Application Support/solagent
        // Linux: ~/.config/solagent
        // Windows: %APPDATA%\\solagent
        let proj =
            ProjectDirs::from("", "", "solagent").context("failed to resolve project dirs")?;
        let config_dir = proj.config_dir().to_path_buf();
        let data_dir = proj.data_dir().to_path_buf();
        let log_file = data_dir.join(LOG_FILE_NAME);

        Ok(Self {
            config_dir,
            data_dir,
            log_file,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    pub fn ensure_private_dirs(&self) -> eyre::Result<()> {
        crate::fsutil::ensure_private_dir(&self.config_dir)?;
        crate::fsutil::ensure_private_dir(&self.data_dir)?;
        Ok(())
    }
}
