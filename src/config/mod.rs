//! `settings.toml` and the directories around it.
//!
//! Every section of [`AppConfig`] has working defaults, so a missing file or
//! a file that overrides a single key are both fine.

pub mod paths;
pub mod settings;

pub use paths::{AppPaths, HOME_ENV};
pub use settings::{
    AppConfig, CodecConfig, EditConfig, LocatorConfig, PrimaryTtsConfig, SecondaryTtsConfig,
    SttConfig, TtsConfig,
};
