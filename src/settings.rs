use anyhow::{Context, Result};
use chrono::{FixedOffset, Local, Offset};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::PathBuf, sync::RwLock};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendSettings {
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            provider: "local".into(),
            model: None,
            api_key: None,
            endpoint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    pub sample_target: usize,
    pub max_frame_height: u32,
    pub jpeg_quality: u8,
    /// 1 keeps captioning sequential.
    pub caption_concurrency: usize,
    pub caption_timeout_secs: u64,
    pub generation_timeout_secs: u64,
    /// Offset used to format card times; the host's current offset when unset.
    pub utc_offset_minutes: Option<i32>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            sample_target: 15,
            max_frame_height: 720,
            jpeg_quality: 75,
            caption_concurrency: 1,
            caption_timeout_secs: 30,
            generation_timeout_secs: 90,
            utc_offset_minutes: None,
        }
    }
}

impl PipelineSettings {
    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .and_then(|minutes| minutes.checked_mul(60))
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Local::now().offset().fix())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BatchingSettings {
    pub batch_window_secs: i64,
    pub max_gap_secs: i64,
}

impl Default for BatchingSettings {
    fn default() -> Self {
        Self {
            batch_window_secs: 15 * 60,
            max_gap_secs: 5 * 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UserSettings {
    pub backend: BackendSettings,
    pub pipeline: PipelineSettings,
    pub batching: BatchingSettings,
    pub categories: Vec<String>,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            backend: BackendSettings::default(),
            pipeline: PipelineSettings::default(),
            batching: BatchingSettings::default(),
            categories: vec![
                "Work".into(),
                "Personal".into(),
                "Distraction".into(),
                "Idle".into(),
            ],
        }
    }
}

impl UserSettings {
    /// Environment variables win over whatever the settings file says.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = env::var("LEFOCUS_PROVIDER") {
            self.backend.provider = provider;
        }
        if let Ok(model) = env::var("LEFOCUS_MODEL") {
            self.backend.model = Some(model);
        }
        if let Ok(api_key) = env::var("LEFOCUS_API_KEY") {
            self.backend.api_key = Some(api_key);
        }
        if let Ok(endpoint) = env::var("LEFOCUS_ENDPOINT") {
            self.backend.endpoint = Some(endpoint);
        }
    }

    /// Copy safe to print: the API key is reduced to its first characters.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.backend.api_key = copy.backend.api_key.map(|key| {
            let prefix: String = key.chars().take(4).collect();
            format!("{prefix}…")
        });
        copy
    }
}

/// Where the database and settings file live.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = env::var("LEFOCUS_DATA_DIR") {
        return PathBuf::from(dir);
    }
    env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".lefocus-timeline")
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<UserSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                log::warn!("Ignoring unreadable settings at {}: {err}", path.display());
                UserSettings::default()
            })
        } else {
            UserSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Current settings with environment overrides applied.
    pub fn effective(&self) -> UserSettings {
        let mut settings = self.snapshot();
        settings.apply_env_overrides();
        settings
    }

    pub fn snapshot(&self) -> UserSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: UserSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &UserSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
