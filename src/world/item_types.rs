use crate::config::ConfigError;
use crate::entities::item::ItemTypeId;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ItemType {
    pub id: ItemTypeId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stackable: bool,
    #[serde(default)]
    pub fluid_container: bool,
    #[serde(default)]
    pub fluid: bool,
}

impl ItemType {
    /// Whether the wire form carries a count/subtype byte after the id.
    pub fn has_count(&self) -> bool {
        self.stackable || self.fluid_container || self.fluid
    }
}

#[derive(Debug, Default, Clone)]
pub struct ItemTypeIndex {
    types: HashMap<ItemTypeId, ItemType>,
}

#[derive(Debug, Deserialize)]
struct ItemCatalogFile {
    #[serde(default)]
    items: Vec<ItemType>,
}

impl ItemTypeIndex {
    pub fn get(&self, id: ItemTypeId) -> Option<&ItemType> {
        self.types.get(&id)
    }

    pub fn insert(&mut self, item: ItemType) -> Result<(), String> {
        if self.types.contains_key(&item.id) {
            return Err(format!("item type {:?} already exists", item.id));
        }
        self.types.insert(item.id, item);
        Ok(())
    }

    pub fn has_count(&self, id: ItemTypeId) -> bool {
        self.get(id).map(ItemType::has_count).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let file: ItemCatalogFile = serde_yaml::from_str(source)?;
        let mut index = ItemTypeIndex::default();
        for item in file.items {
            index.insert(item).map_err(ConfigError::Invalid)?;
        }
        Ok(index)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Read(path.to_path_buf(), err))?;
        Self::from_yaml_str(&source)
    }
}
