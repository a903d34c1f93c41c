use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub emissary_api_url: String,
    pub emissary_api_key: String,
    pub emissary_api_timeout_secs: u64,
    pub emissary_upload_dir: String,
    pub app_tester_upload_dir: String,
    pub results_dir: String,
    pub api_feedback_speed_ms: u64,
    pub spider_max_depth: u32,
    pub spider_thread_count: u32,
    pub spider_max_children: u32,
    pub webdriver_url: String,
    pub test_session_file: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, env::VarError> {
        Ok(Self {
            emissary_api_url: env::var("EMISSARY_API_URL")?,
            emissary_api_key: env::var("EMISSARY_API_KEY")?,
            emissary_api_timeout_secs: env::var("EMISSARY_API_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            emissary_upload_dir: env::var("EMISSARY_UPLOAD_DIR")
                .unwrap_or_else(|_| "/zap/upload/".to_string()),
            app_tester_upload_dir: env::var("APP_TESTER_UPLOAD_DIR")
                .unwrap_or_else(|_| "/mnt/upload/".to_string()),
            results_dir: env::var("RESULTS_DIR")
                .unwrap_or_else(|_| "/var/log/appscanner/".to_string()),
            api_feedback_speed_ms: env::var("API_FEEDBACK_SPEED_MS")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()
                .unwrap_or(5000),
            spider_max_depth: env::var("SPIDER_MAX_DEPTH")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            spider_thread_count: env::var("SPIDER_THREAD_COUNT")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            spider_max_children: env::var("SPIDER_MAX_CHILDREN")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .unwrap_or(10),
            webdriver_url: env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| "http://localhost:4444".to_string()),
            test_session_file: env::var("TEST_SESSION_FILE").ok(),
        })
    }

    /// The Emissary tuning subset handed to the phases.
    pub fn emissary_properties(&self) -> EmissaryProperties {
        EmissaryProperties {
            api_feedback_speed: Duration::from_millis(self.api_feedback_speed_ms),
            max_depth: self.spider_max_depth,
            thread_count: self.spider_thread_count,
            max_children: self.spider_max_children,
            results_dir: self.results_dir.clone(),
            upload_dir: self.emissary_upload_dir.clone(),
            app_tester_upload_dir: self.app_tester_upload_dir.clone(),
        }
    }
}

/// Emissary-side tuning and directory layout for one session.
#[derive(Debug, Clone)]
pub struct EmissaryProperties {
    /// Poll interval for spider and active scan progress.
    pub api_feedback_speed: Duration,
    pub max_depth: u32,
    pub thread_count: u32,
    pub max_children: u32,
    /// Where the Emissary writes reports; shared with this process.
    pub results_dir: String,
    /// Upload directory as seen by the Emissary process.
    pub upload_dir: String,
    /// Upload directory as seen by this process.
    pub app_tester_upload_dir: String,
}

impl Default for EmissaryProperties {
    fn default() -> Self {
        Self {
            api_feedback_speed: Duration::from_millis(5000),
            max_depth: 10,
            thread_count: 10,
            max_children: 10,
            results_dir: "/var/log/appscanner/".to_string(),
            upload_dir: "/zap/upload/".to_string(),
            app_tester_upload_dir: "/mnt/upload/".to_string(),
        }
    }
}
