#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize)]
#[serde(transparent)]
pub struct ItemTypeId(pub u16);

/// An item as it appears on the wire. The extra byte is a stack count for
/// cumulative items and a fluid subtype for liquids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub type_id: ItemTypeId,
    pub count_or_subtype: Option<u8>,
}

impl Item {
    pub fn new(type_id: ItemTypeId) -> Self {
        Self {
            type_id,
            count_or_subtype: None,
        }
    }
}
