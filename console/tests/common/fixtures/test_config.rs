//! Test configuration builder writing `main.toml` to a temp directory

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub struct TestConfigBuilder {
    temp_dir: TempDir,
    base_url: String,
    poll_interval_ms: Option<u64>,
    request_timeout_seconds: Option<u64>,
    connect_timeout_seconds: Option<u64>,
    raw: Option<String>,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        Self {
            temp_dir,
            base_url: "http://localhost:8080/rest".to_string(),
            poll_interval_ms: None,
            request_timeout_seconds: None,
            connect_timeout_seconds: None,
            raw: None,
        }
    }

    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn poll_interval_ms(mut self, millis: u64) -> Self {
        self.poll_interval_ms = Some(millis);
        self
    }

    pub fn request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_seconds = Some(seconds);
        self
    }

    pub fn connect_timeout(mut self, seconds: u64) -> Self {
        self.connect_timeout_seconds = Some(seconds);
        self
    }

    /// Write this content verbatim instead of the built TOML
    pub fn raw(mut self, content: &str) -> Self {
        self.raw = Some(content.to_string());
        self
    }

    pub fn build(self) -> TestConfig {
        let config_dir = self.temp_dir.path().join("config");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        let content = match &self.raw {
            Some(raw) => raw.clone(),
            None => self.to_toml(),
        };
        fs::write(config_dir.join("main.toml"), content).expect("Failed to write main.toml");

        TestConfig {
            _temp_dir: self.temp_dir,
            config_dir,
        }
    }

    fn to_toml(&self) -> String {
        let mut toml = format!("base_url = \"{}\"\n", self.base_url);
        if let Some(millis) = self.poll_interval_ms {
            toml.push_str(&format!("poll_interval_ms = {}\n", millis));
        }
        if let Some(seconds) = self.request_timeout_seconds {
            toml.push_str(&format!("request_timeout_seconds = {}\n", seconds));
        }
        if let Some(seconds) = self.connect_timeout_seconds {
            toml.push_str(&format!("connect_timeout_seconds = {}\n", seconds));
        }
        toml
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Written configuration; the directory lives as long as this value
pub struct TestConfig {
    _temp_dir: TempDir,
    config_dir: PathBuf,
}

impl TestConfig {
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }
}
