bitflags::bitflags! {
    /// The id of a region in a [`CompactHeightfield`](crate::CompactHeightfield).
    /// The low 15 bits hold the id, the high bit flags regions touching the heightfield border.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    #[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
    #[repr(transparent)]
    pub struct RegionId: u16 {
        /// The default region, which is used for spans that are not in a region.
        const NONE = 0;

        /// Heightfield border flag.
        /// If a heightfield region ID has this bit set, then the region is a border
        /// region and its spans are considered un-walkable.
        /// (Used during the region and contour build process.)
        const BORDER_REGION = 0x8000;

        /// The largest representable region id, flags included.
        const MAX = u16::MAX;
    }
}

impl From<u16> for RegionId {
    fn from(value: u16) -> Self {
        RegionId::from_bits_retain(value)
    }
}

impl RegionId {
    /// Whether the span belongs to an actual interior region, i.e. neither [`RegionId::NONE`]
    /// nor a border region.
    #[inline]
    pub fn is_interior(&self) -> bool {
        *self != RegionId::NONE && !self.contains(RegionId::BORDER_REGION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interior_regions() {
        assert!(!RegionId::NONE.is_interior());
        assert!(RegionId::from(3).is_interior());
        assert!(!(RegionId::from(3) | RegionId::BORDER_REGION).is_interior());
    }
}
