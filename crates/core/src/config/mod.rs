use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{IgnoreFilter, MappingDescriptor, MidiSyncError, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub midi: MidiConfig,
    pub mappings: Vec<MappingDescriptor>,
}

impl AppConfig {
    pub fn live_defaults() -> Self {
        Self::default()
    }

    /// Reads a JSON configuration file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.midi.validate()?;
        Ok(config)
    }
}

/// Configuration specific to the MIDI subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiConfig {
    /// Client name announced to the platform driver.
    pub client_name: String,
    /// Try the native driver before falling back to host delivery.
    pub prefer_native: bool,
    /// Open `auto_connect_port` right after backend selection.
    pub auto_connect: bool,
    pub auto_connect_port: i32,
    pub queue_capacity: usize,
    pub ignore: IgnoreFilter,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            client_name: "midisync".to_string(),
            prefer_native: true,
            auto_connect: false,
            auto_connect_port: 0,
            queue_capacity: 1024,
            ignore: IgnoreFilter::default(),
        }
    }
}

impl MidiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queue_capacity == 0 {
            return Err(MidiSyncError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{ "midi": { "auto_connect": true } }"#).unwrap();
        assert!(config.midi.auto_connect);
        assert_eq!(config.midi.queue_capacity, 1024);
        assert!(!config.midi.ignore.timing);
        assert!(config.mappings.is_empty());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let config = MidiConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(MidiSyncError::Config(_))));
    }

    #[test]
    fn loads_from_file() {
        let path =
            std::env::temp_dir().join(format!("midisync-config-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "mappings": [ { "controller": 1, "target": "intensity" } ] }"#,
        )
        .unwrap();

        let config = AppConfig::from_json_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.mappings.len(), 1);
        assert_eq!(config.mappings[0].target, "intensity");
        assert_eq!(config.mappings[0].max, 1.0);
    }
}
