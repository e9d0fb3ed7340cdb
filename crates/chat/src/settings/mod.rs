pub mod state;

pub use state::{ChatSettings, ReplyMode, SettingsError, SettingsStore};
