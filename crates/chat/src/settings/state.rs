use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use murmur_llm::{
    DEFAULT_CANNED_REPLY, DEFAULT_FAILURE_PROBABILITY, DelayedReplySource, WordStreamSource,
    clamp_probability,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

use crate::chat::DEFAULT_PLACEHOLDER_TEXT;

pub const SETTINGS_DIRECTORY_NAME: &str = "murmur";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "MURMUR_";
pub const DEFAULT_REPLY_DELAY_MS: u64 = 1_500;
pub const DEFAULT_CHUNK_INTERVAL_MS: u64 = 120;
pub const DEFAULT_STREAM_TEXT: &str = "Streaming lets the reply show up one word at a time \
while the full message is still being put together in the background.";

/// How the assistant reply for a submission is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Word-by-word stream with a live preview.
    #[default]
    Streaming,
    /// One canned reply after a fixed delay; may fail.
    Deferred,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    #[serde(default)]
    pub reply_mode: ReplyMode,
    #[serde(default = "default_reply_delay_ms")]
    pub reply_delay_ms: u64,
    #[serde(default = "default_chunk_interval_ms")]
    pub chunk_interval_ms: u64,
    #[serde(default = "default_failure_probability")]
    pub failure_probability: f64,
    #[serde(default = "default_canned_reply")]
    pub canned_reply: String,
    #[serde(default = "default_stream_text")]
    pub stream_text: String,
    #[serde(default = "default_placeholder_text")]
    pub placeholder_text: String,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            reply_mode: ReplyMode::default(),
            reply_delay_ms: default_reply_delay_ms(),
            chunk_interval_ms: default_chunk_interval_ms(),
            failure_probability: default_failure_probability(),
            canned_reply: default_canned_reply(),
            stream_text: default_stream_text(),
            placeholder_text: default_placeholder_text(),
        }
    }
}

impl ChatSettings {
    pub fn reply_delay(&self) -> Duration {
        Duration::from_millis(self.reply_delay_ms)
    }

    pub fn chunk_interval(&self) -> Duration {
        Duration::from_millis(self.chunk_interval_ms)
    }

    pub fn reply_source(&self) -> DelayedReplySource {
        DelayedReplySource::new(
            self.reply_delay(),
            self.canned_reply.clone(),
            self.failure_probability,
        )
    }

    pub fn stream_source(&self) -> WordStreamSource {
        WordStreamSource::new(self.stream_text.clone(), self.chunk_interval())
    }

    pub fn normalized(mut self) -> Self {
        self.failure_probability = clamp_probability(self.failure_probability);
        self.canned_reply = self.canned_reply.trim().to_string();
        if self.canned_reply.is_empty() {
            self.canned_reply = default_canned_reply();
        }
        // Keep at least one word so the streaming variant always emits something.
        if self.stream_text.trim().is_empty() {
            self.stream_text = default_stream_text();
        }
        self.placeholder_text = self.placeholder_text.trim().to_string();
        if self.placeholder_text.is_empty() {
            self.placeholder_text = default_placeholder_text();
        }

        self
    }

    /// Layered sources: built-in defaults, then the JSON file, then
    /// `MURMUR_*` environment variables.
    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(ChatSettings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    pub fn extract(figment: &Figment) -> Result<Self, SettingsError> {
        figment
            .extract::<ChatSettings>()
            .map(ChatSettings::normalized)
            .map_err(Box::new)
            .context(ExtractSnafu {
                stage: "extract-settings",
            })
    }
}

pub struct SettingsStore {
    settings: Arc<ArcSwap<ChatSettings>>,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".murmur"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        let settings = Self::load_from_disk(&config_path);
        Self {
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn settings(&self) -> Arc<ChatSettings> {
        self.settings.load_full()
    }

    /// Replaces the live settings without touching disk.
    pub fn apply(&self, settings: ChatSettings) {
        self.settings.store(Arc::new(settings.normalized()));
    }

    /// Persists and then replaces the live settings.
    pub fn update(&self, settings: ChatSettings) -> Result<(), SettingsError> {
        let normalized_settings = settings.normalized();
        self.persist(&normalized_settings)?;
        self.settings.store(Arc::new(normalized_settings));
        Ok(())
    }

    fn load_from_disk(path: &Path) -> ChatSettings {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        match ChatSettings::extract(&ChatSettings::figment(path)) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(
                    "failed to parse settings from {:?}: {}. using defaults",
                    path,
                    error
                );
                ChatSettings::default()
            }
        }
    }

    fn persist(&self, settings: &ChatSettings) -> Result<(), SettingsError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent).context(CreateDirSnafu {
                stage: "create-settings-directory",
                path: parent.to_path_buf(),
            })?;
        }

        let content = serde_json::to_string_pretty(settings).context(SerializeConfigSnafu {
            stage: "serialize-settings-json",
        })?;

        let temp_path = self.config_path.with_extension("json.tmp");
        std::fs::write(&temp_path, content).context(WriteFileSnafu {
            stage: "write-temporary-settings-file",
            path: temp_path.clone(),
        })?;

        std::fs::rename(&temp_path, &self.config_path).context(RenameTempFileSnafu {
            stage: "rename-temporary-settings-file",
            from: temp_path,
            to: self.config_path.clone(),
        })?;

        tracing::info!("saved settings to {:?}", self.config_path);
        Ok(())
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to create settings directory at {path:?} on `{stage}`: {source}"))]
    CreateDir {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to serialize settings on `{stage}`: {source}"))]
    SerializeConfig {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("failed to write settings file at {path:?} on `{stage}`: {source}"))]
    WriteFile {
        stage: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display(
        "failed to replace settings file from {from:?} to {to:?} on `{stage}`: {source}"
    ))]
    RenameTempFile {
        stage: &'static str,
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    #[snafu(display("failed to read settings on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        source: Box<figment::Error>,
    },
}

fn default_reply_delay_ms() -> u64 {
    DEFAULT_REPLY_DELAY_MS
}

fn default_chunk_interval_ms() -> u64 {
    DEFAULT_CHUNK_INTERVAL_MS
}

fn default_failure_probability() -> f64 {
    DEFAULT_FAILURE_PROBABILITY
}

fn default_canned_reply() -> String {
    DEFAULT_CANNED_REPLY.to_string()
}

fn default_stream_text() -> String {
    DEFAULT_STREAM_TEXT.to_string()
}

fn default_placeholder_text() -> String {
    DEFAULT_PLACEHOLDER_TEXT.to_string()
}

#[cfg(test)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    // Tests that load layered settings run inside a `Jail`, which serializes
    // environment changes.

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let store = SettingsStore::new(jail.directory().join("absent.json"));

            assert_eq!(*store.settings(), ChatSettings::default());
            Ok(())
        });
    }

    #[test]
    fn file_values_override_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "reply_mode": "deferred", "canned_reply": "  ask later  ", "failure_probability": 3.5 }"#,
            )?;

            let settings = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME)).settings();

            assert_eq!(settings.reply_mode, ReplyMode::Deferred);
            assert_eq!(settings.canned_reply, "ask later");
            assert_eq!(settings.failure_probability, 1.0);
            assert_eq!(settings.reply_delay_ms, DEFAULT_REPLY_DELAY_MS);
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_the_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE_NAME,
                r#"{ "reply_mode": "streaming", "reply_delay_ms": 900 }"#,
            )?;
            jail.set_env("MURMUR_REPLY_MODE", "deferred");

            let settings = SettingsStore::new(jail.directory().join(SETTINGS_FILE_NAME)).settings();

            assert_eq!(settings.reply_mode, ReplyMode::Deferred);
            assert_eq!(settings.reply_delay_ms, 900);
            Ok(())
        });
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(SETTINGS_FILE_NAME, r#"{ "reply_delay_ms": "soon" }"#)?;
            let path = jail.directory().join(SETTINGS_FILE_NAME);

            assert!(ChatSettings::extract(&ChatSettings::figment(&path)).is_err());
            assert_eq!(*SettingsStore::new(path).settings(), ChatSettings::default());
            Ok(())
        });
    }

    #[test]
    fn update_persists_and_reloads() {
        Jail::expect_with(|jail| {
            let path = jail.directory().join("nested").join(SETTINGS_FILE_NAME);
            let store = SettingsStore::new(path.clone());

            let settings = ChatSettings {
                reply_mode: ReplyMode::Deferred,
                reply_delay_ms: 10,
                ..ChatSettings::default()
            };
            store.update(settings.clone()).expect("persist settings");

            assert_eq!(*store.settings(), settings);
            assert!(!path.with_extension("json.tmp").exists());
            assert_eq!(*SettingsStore::new(path).settings(), settings);
            Ok(())
        });
    }

    #[test]
    fn apply_does_not_touch_disk() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        let store = SettingsStore::new(path.clone());

        store.apply(ChatSettings {
            placeholder_text: "   ".to_string(),
            failure_probability: -1.0,
            ..ChatSettings::default()
        });

        assert_eq!(store.settings().placeholder_text, DEFAULT_PLACEHOLDER_TEXT);
        assert_eq!(store.settings().failure_probability, 0.0);
        assert!(!path.exists());
        assert_eq!(store.config_path(), path.as_path());
    }
}
