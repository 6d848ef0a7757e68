use crate::term::Key;
use crate::{muted_error, weak_error};
use log::error;
use serde::de;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fs::read_to_string;
use std::path::Path;

/// One command against the application context. Keys are bound to ordered
/// action lists, so a single keystroke can chain a session command with the
/// refresh it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Action {
    Quit,
    /// Move the frame cursor toward the innermost frame.
    FrameUp,
    /// Move the frame cursor toward the outermost frame.
    FrameDown,
    StepInto,
    StepOver,
    Continue,
    Abort,
    ScrollUp,
    ScrollDown,
    RefreshAll,
    /// Re-fetch only the frame-scoped data (source and variables).
    RefreshFrame,
}

/// A [`Key`] deserializable from its textual name ("q", "alt-q", "f4", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BoundKey(Key);

impl<'de> Deserialize<'de> for BoundKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(BoundKey(s.parse().map_err(de::Error::custom)?))
    }
}

#[derive(Debug, Deserialize)]
struct KeyMapConfig {
    bindings: HashMap<BoundKey, Vec<Action>>,
}

/// Dispatch table from key identity to an ordered action list.
#[derive(Debug)]
pub struct KeyMap {
    bindings: HashMap<Key, Vec<Action>>,
}

impl From<KeyMapConfig> for KeyMap {
    fn from(config: KeyMapConfig) -> Self {
        Self {
            bindings: config
                .bindings
                .into_iter()
                .map(|(key, actions)| (key.0, actions))
                .collect(),
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let default_config = include_str!("preset/keymap.toml");
        let bindings: KeyMapConfig = toml::de::from_str(default_config).expect("should de");
        bindings.into()
    }
}

impl KeyMap {
    const DEFAULT_PATH: &'static str = ".config/plbug/keymap.toml";

    /// Load keymap from file. Return [`None`] on errors.
    pub fn from_file(path: Option<&Path>) -> Option<Self> {
        let data = match path {
            None => {
                let path = home::home_dir()?;
                let path = path.join(Self::DEFAULT_PATH);
                muted_error!(read_to_string(path))?
            }
            Some(path) => match read_to_string(path) {
                Ok(data) => data,
                Err(err) => {
                    error!("Error while load keymap file: {err}");
                    return None;
                }
            },
        };

        let bindings: KeyMapConfig = weak_error!(toml::de::from_str(&data))?;
        Some(bindings.into())
    }

    /// Actions bound to `key`, in dispatch order.
    pub fn actions(&self, key: &Key) -> &[Action] {
        self.bindings.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}
