use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Persistent state flags carried by every entity.
    ///
    /// Bit values match the saved-document encoding.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct EntityFlags: u32 {
        const SELECTED = 1 << 1;
        /// Soft-deleted. The arena slot is kept so history can bring it back.
        const REMOVED = 1 << 2;
        const FROZEN = 1 << 3;
        const HIDDEN = 1 << 4;
        const UNSELECTABLE = 1 << 5;
        const EDIT_LIGHT = 1 << 6;
        const LOCKED = 1 << 7;
    }
}

bitflags! {
    /// Cached data that must be recomputed before the next read.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct DirtyFlags: u8 {
        const GEOMETRY = 1 << 0;
        const POSITION = 1 << 1;
        const MATERIAL = 1 << 2;
        const DISPLAY = 1 << 3;
        const BOUND = 1 << 4;
    }
}

impl DirtyFlags {
    /// What a restored entity marks on itself and its ancestors.
    pub const RESTORED: DirtyFlags = DirtyFlags::GEOMETRY
        .union(DirtyFlags::POSITION)
        .union(DirtyFlags::BOUND);
}
