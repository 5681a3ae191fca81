use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::SimConfig;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub(crate) enum SettingsError {
    #[error("failed to read scene settings {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid scene settings {path} at {location}: {source}")]
    Parse {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads optional scene tunables. A missing file means shipped defaults;
/// anything else that fails is reported.
pub(crate) fn load_settings(path: &Path) -> Result<SimConfig, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(source) if source.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "scene_settings_default");
            return Ok(SimConfig::default());
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let mut deserializer = serde_json::Deserializer::from_str(&raw);
    let config: SimConfig =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let location = error.path().to_string();
            SettingsError::Parse {
                path: path.to_path_buf(),
                location,
                source: error.into_inner(),
            }
        })?;
    info!(
        path = %path.display(),
        seeded = config.rng_seed.is_some(),
        "scene_settings_loaded"
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let temp = TempDir::new().expect("temp");
        let config = load_settings(&temp.path().join("scene.json")).expect("defaults");
        assert_eq!(config, SimConfig::default());
    }

    #[test]
    fn overrides_are_applied() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("scene.json");
        fs::write(
            &path,
            r#"{"proximity_radius": 64.0, "debug_visible": true, "camera": {"zoom": 2.0}}"#,
        )
        .expect("write settings");

        let config = load_settings(&path).expect("settings");
        assert_eq!(config.proximity_radius, 64.0);
        assert!(config.debug_visible);
        assert_eq!(config.camera.zoom, 2.0);
        assert_eq!(config.player_speed, SimConfig::default().player_speed);
    }

    #[test]
    fn malformed_value_reports_location() {
        let temp = TempDir::new().expect("temp");
        let path = temp.path().join("scene.json");
        fs::write(&path, r#"{"stop_delay_secs": {"min": 1.0, "max": "soon"}}"#)
            .expect("write settings");

        let error = load_settings(&path).expect_err("malformed");
        match error {
            SettingsError::Parse { location, .. } => assert_eq!(location, "stop_delay_secs.max"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_in_place_of_file_is_a_read_error() {
        let temp = TempDir::new().expect("temp");
        let error = load_settings(temp.path()).expect_err("directory");
        assert!(matches!(error, SettingsError::Read { .. }));
    }
}
