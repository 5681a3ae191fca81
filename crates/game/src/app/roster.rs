use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::{NpcId, NpcInfo, NpcSpawn, Vec2};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub(crate) enum RosterError {
    #[error("failed to read NPC roster {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid NPC roster {path} at {location}: {source}")]
    Parse {
        path: PathBuf,
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("NPC roster {path} entry {index} has an empty id")]
    EmptyId { path: PathBuf, index: usize },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RosterFile {
    npcs: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RosterEntry {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    position: Vec2,
}

impl RosterEntry {
    fn into_spawn(self) -> NpcSpawn {
        let id = NpcId(self.id);
        let placeholder = NpcInfo::placeholder(&id);
        NpcSpawn {
            info: NpcInfo {
                name: self.name.unwrap_or(placeholder.name),
                description: self.description.unwrap_or(placeholder.description),
            },
            id,
            position: self.position,
        }
    }
}

pub(crate) fn load_roster(path: &Path) -> Result<Vec<NpcSpawn>, RosterError> {
    let raw = fs::read_to_string(path).map_err(|source| RosterError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let roster = parse_roster(path, &raw)?;
    info!(path = %path.display(), npcs = roster.len(), "roster_loaded");
    Ok(roster)
}

fn parse_roster(path: &Path, raw: &str) -> Result<Vec<NpcSpawn>, RosterError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let file: RosterFile =
        serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
            let location = error.path().to_string();
            RosterError::Parse {
                path: path.to_path_buf(),
                location,
                source: error.into_inner(),
            }
        })?;

    if let Some(index) = file.npcs.iter().position(|entry| entry.id.trim().is_empty()) {
        return Err(RosterError::EmptyId {
            path: path.to_path_buf(),
            index,
        });
    }
    Ok(file.npcs.into_iter().map(RosterEntry::into_spawn).collect())
}
