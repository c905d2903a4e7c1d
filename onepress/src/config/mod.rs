//! Configuration for OnePress components.
//!
//! Settings live in an INI file at `~/.onepress/config.ini` and load into
//! the structured [`ConfigFile`] type. A missing file yields the built-in
//! defaults; a present file only needs the keys it wants to override.
//!
//! The module splits along responsibilities:
//!
//! - `settings`: the plain data structs components consume
//! - `defaults`: built-in values and range clamping
//! - `file`: load/save and the config directory location
//! - `parser`: INI text → [`ConfigFile`]
//! - `writer`: [`ConfigFile`] → commented INI text
//! - `keys`: `get`/`set` access by dotted key name, with validation
//!
//! # Example
//!
//! ```no_run
//! use onepress::config::ConfigFile;
//!
//! let config = ConfigFile::load().unwrap();
//! println!("idle window: {}s", config.coalescer.idle_window_secs);
//! ```

mod defaults;
mod file;
mod keys;
mod parser;
mod settings;
mod writer;

pub use file::{config_directory, config_file_path, ConfigFileError};
pub use keys::{ConfigKey, ConfigKeyError};
pub use settings::{
    BackendSettings, CoalescerSettings, ConfigFile, LoggingSettings, StateSettings,
};
