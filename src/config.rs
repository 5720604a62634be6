use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read {} failed: {}", .0.display(), .1)]
    Read(PathBuf, #[source] std::io::Error),
    #[error("yaml parse failed: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug)]
pub struct AppConfig {
    pub capture: PathBuf,
    pub protocol_config: Option<PathBuf>,
    pub item_catalog: Option<PathBuf>,
    pub log_level: String,
}

impl AppConfig {
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        if args.len() < 2 {
            return Err(
                "usage: otwire <capture-file> [protocol_config.yaml] [items.yaml]".to_string(),
            );
        }

        let capture = Path::new(&args[1]).to_path_buf();
        let protocol_config = args.get(2).map(PathBuf::from);
        let item_catalog = args.get(3).map(PathBuf::from);
        let log_level = std::env::var("OTWIRE_LOG")
            .ok()
            .and_then(|value| {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
            .unwrap_or_else(|| "info".to_string());
        Ok(Self {
            capture,
            protocol_config,
            item_catalog,
            log_level,
        })
    }
}

/// Window dimensions around the center tile, in tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AwareRange {
    pub left: u16,
    pub right: u16,
    pub top: u16,
    pub bottom: u16,
}

impl Default for AwareRange {
    fn default() -> Self {
        Self {
            left: 8,
            right: 9,
            top: 6,
            bottom: 7,
        }
    }
}

impl AwareRange {
    pub fn width(&self) -> u16 {
        self.left + self.right + 1
    }

    pub fn height(&self) -> u16 {
        self.top + self.bottom + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FloorLayout {
    pub sea_floor: u8,
    pub underground_floor: u8,
    pub max_z: u8,
    pub underground_range: u8,
}

impl Default for FloorLayout {
    fn default() -> Self {
        Self {
            sea_floor: 7,
            underground_floor: 8,
            max_z: 15,
            underground_range: 2,
        }
    }
}

/// Half-open id ranges the server allocates creature ids from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CreatureIdRanges {
    pub player_start: u32,
    pub player_end: u32,
    pub monster_start: u32,
    pub monster_end: u32,
    pub npc_start: u32,
    pub npc_end: u32,
}

impl Default for CreatureIdRanges {
    fn default() -> Self {
        Self {
            player_start: 0x1000_0000,
            player_end: 0x4000_0000,
            monster_start: 0x4000_0000,
            monster_end: 0x8000_0000,
            npc_start: 0x8000_0000,
            npc_end: 0xffff_ffff,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    pub protocol_version: u16,
    pub aware: AwareRange,
    pub floors: FloorLayout,
    pub max_tile_things: usize,
    pub creature_ids: CreatureIdRanges,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            protocol_version: 860,
            aware: AwareRange::default(),
            floors: FloorLayout::default(),
            max_tile_things: 10,
            creature_ids: CreatureIdRanges::default(),
        }
    }
}

impl ProtocolConfig {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: ProtocolConfig = serde_yaml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        Self::from_yaml_str(&source)
    }

    /// Death messages carry a penalty byte from 8.62 on.
    pub fn has_death_penalty(&self) -> bool {
        self.protocol_version >= 862
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let aware = &self.aware;
        let width = u32::from(aware.left) + u32::from(aware.right) + 1;
        let height = u32::from(aware.top) + u32::from(aware.bottom) + 1;
        if width > u32::from(u16::MAX) || height > u32::from(u16::MAX) {
            return Err(ConfigError::Invalid(format!(
                "aware range {}x{} does not fit 16-bit coordinates",
                width, height
            )));
        }
        let floors = &self.floors;
        if floors.sea_floor >= floors.max_z || floors.underground_floor != floors.sea_floor + 1 {
            return Err(ConfigError::Invalid(format!(
                "floor layout sea={} underground={} max={} is inconsistent",
                floors.sea_floor, floors.underground_floor, floors.max_z
            )));
        }
        if floors.underground_range > floors.sea_floor
            || u16::from(floors.underground_floor) + u16::from(floors.underground_range)
                > u16::from(floors.max_z)
        {
            return Err(ConfigError::Invalid(format!(
                "underground range {} does not fit floors {}..={}",
                floors.underground_range, floors.sea_floor, floors.max_z
            )));
        }
        Ok(())
    }
}
