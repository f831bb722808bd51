mod settings;

pub use settings::{SettingsError, TimingSettings, WatcherSettings};
