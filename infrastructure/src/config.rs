use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_MODEL: &str = "smart";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct Config {
    pub api_url: String,
    pub data_dir: PathBuf,
    pub db_file: String,
    pub request_timeout: Duration,
    pub default_model: String,
}

impl Config {
    pub fn load() -> Self {
        dotenv().ok();
        let timeout_secs = env::var("RUTAN_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Self {
            api_url: env::var("RUTAN_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            data_dir: env::var("RUTAN_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::default_data_dir()),
            db_file: env::var("RUTAN_DB_FILE").unwrap_or_else(|_| "rutan.db".to_string()),
            request_timeout: Duration::from_secs(timeout_secs),
            default_model: env::var("RUTAN_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
        }
    }

    fn default_data_dir() -> PathBuf {
        let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let mut path = PathBuf::from(home);
        path.push(".local");
        path.push("share");
        path.push("rutan");
        path
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(&self.db_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            data_dir: Self::default_data_dir(),
            db_file: "rutan.db".to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}
