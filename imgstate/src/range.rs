//! Subresource ranges.
use bitflags::bitflags;
use std::fmt;

/// Sentinel for `mip_levels` / `array_size` meaning "every level (or layer) from the base to the end".
pub const REMAINING: u32 = u32::MAX;

bitflags! {
    /// Planes of image data that are tracked independently.
    ///
    /// Flags are declared in ascending bit order, which is also the order in which
    /// multi-aspect transitions are integrated into a ledger.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
    pub struct AspectMask: u32 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
        const METADATA = 1 << 3;
        const PLANE_0 = 1 << 4;
        const PLANE_1 = 1 << 5;
        const PLANE_2 = 1 << 6;
    }
}

/// Mip and array dimensions of an image, as declared at creation time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Extent {
    pub mip_levels: u32,
    pub array_size: u32,
}

impl Extent {
    pub const fn new(mip_levels: u32, array_size: u32) -> Extent {
        Extent { mip_levels, array_size }
    }

    /// Number of (mip, layer) pairs in one aspect.
    pub fn subresource_count(&self) -> usize {
        self.mip_levels as usize * self.array_size as usize
    }
}

/// A selection of mip levels and array layers within one or more aspects of an image.
///
/// `mip_levels` and `array_size` may hold [`REMAINING`] until the range is resolved against
/// the image's extent with [`SubresourceRange::resolve`].
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct SubresourceRange {
    pub aspect_mask: AspectMask,
    pub base_mip_level: u32,
    pub mip_levels: u32,
    pub base_array_layer: u32,
    pub array_size: u32,
}

impl SubresourceRange {
    /// Every mip level and array layer of the given aspects.
    pub fn whole(aspect_mask: AspectMask, extent: Extent) -> SubresourceRange {
        SubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            mip_levels: extent.mip_levels,
            base_array_layer: 0,
            array_size: extent.array_size,
        }
    }

    /// A single (mip, layer) subresource.
    pub fn single(aspect_mask: AspectMask, mip_level: u32, array_layer: u32) -> SubresourceRange {
        SubresourceRange {
            aspect_mask,
            base_mip_level: mip_level,
            mip_levels: 1,
            base_array_layer: array_layer,
            array_size: 1,
        }
    }

    /// Replaces the `REMAINING` sentinels with concrete counts.
    ///
    /// Returns `None` if the range starts at or beyond the end of the image, is empty, or
    /// extends past the image's extent. Callers report the failure with the resource's id.
    pub fn resolve(&self, extent: Extent) -> Option<SubresourceRange> {
        if self.base_mip_level >= extent.mip_levels || self.base_array_layer >= extent.array_size {
            return None;
        }
        let mip_levels = if self.mip_levels == REMAINING {
            extent.mip_levels - self.base_mip_level
        } else {
            self.mip_levels
        };
        let array_size = if self.array_size == REMAINING {
            extent.array_size - self.base_array_layer
        } else {
            self.array_size
        };
        if mip_levels == 0 || array_size == 0 {
            return None;
        }
        if self.base_mip_level.checked_add(mip_levels)? > extent.mip_levels
            || self.base_array_layer.checked_add(array_size)? > extent.array_size
        {
            return None;
        }
        Some(SubresourceRange {
            mip_levels,
            array_size,
            ..*self
        })
    }

    pub fn is_resolved(&self) -> bool {
        self.mip_levels != REMAINING && self.array_size != REMAINING
    }

    /// One past the last mip level. Only meaningful on resolved ranges.
    pub fn mip_end(&self) -> u32 {
        self.base_mip_level + self.mip_levels
    }

    /// One past the last array layer. Only meaningful on resolved ranges.
    pub fn layer_end(&self) -> u32 {
        self.base_array_layer + self.array_size
    }

    pub fn subresource_count(&self) -> usize {
        self.mip_levels as usize * self.array_size as usize
    }

    /// Whether the (resolved) range designates exactly one mip level of one array layer.
    pub fn is_single_subresource(&self) -> bool {
        self.mip_levels == 1 && self.array_size == 1
    }

    /// Whether the ranges share an aspect and intersect in both the mip and layer dimensions.
    pub fn overlaps(&self, other: &SubresourceRange) -> bool {
        self.aspect_mask.intersects(other.aspect_mask)
            && self.base_mip_level < other.mip_end()
            && other.base_mip_level < self.mip_end()
            && self.base_array_layer < other.layer_end()
            && other.base_array_layer < self.layer_end()
    }

    /// Whether every subresource of `self` is also selected by `other`.
    pub fn is_within(&self, other: &SubresourceRange) -> bool {
        other.aspect_mask.contains(self.aspect_mask)
            && self.base_mip_level >= other.base_mip_level
            && self.mip_end() <= other.mip_end()
            && self.base_array_layer >= other.base_array_layer
            && self.layer_end() <= other.layer_end()
    }

    pub fn contains_subresource(&self, mip_level: u32, array_layer: u32) -> bool {
        (self.base_mip_level..self.mip_end()).contains(&mip_level)
            && (self.base_array_layer..self.layer_end()).contains(&array_layer)
    }

    /// Same range restricted to (or widened to) the given aspects.
    pub fn with_aspect(&self, aspect_mask: AspectMask) -> SubresourceRange {
        SubresourceRange { aspect_mask, ..*self }
    }

    /// Ordering key of ledger entries: aspect first, then base layer, then base mip.
    ///
    /// Layer before mip is what keeps a slice-major split of an entry sorted in place.
    pub fn sort_key(&self) -> (u32, u32, u32) {
        (self.aspect_mask.bits(), self.base_array_layer, self.base_mip_level)
    }

    /// Index of a subresource of this range in slice-major order (layer varies slowest).
    pub(crate) fn slice_major_index(&self, mip_level: u32, array_layer: u32) -> usize {
        (array_layer - self.base_array_layer) as usize * self.mip_levels as usize
            + (mip_level - self.base_mip_level) as usize
    }

    /// Splits a resolved range into single-subresource ranges, slice-major.
    ///
    /// Element `i` is `(base_array_layer + i / mip_levels, base_mip_level + i % mip_levels)`.
    pub fn subresources(&self) -> impl Iterator<Item = SubresourceRange> {
        let range = *self;
        (0..range.mip_levels * range.array_size).map(move |i| {
            SubresourceRange::single(
                range.aspect_mask,
                range.base_mip_level + i % range.mip_levels,
                range.base_array_layer + i / range.mip_levels,
            )
        })
    }
}

impl fmt::Debug for SubresourceRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn span(f: &mut fmt::Formatter, base: u32, count: u32) -> fmt::Result {
            match count {
                REMAINING => write!(f, "{}..", base),
                1 => write!(f, "{}", base),
                _ => write!(f, "{}..{}", base, base + count),
            }
        }
        write!(f, "{:?} mips ", self.aspect_mask)?;
        span(f, self.base_mip_level, self.mip_levels)?;
        write!(f, " layers ")?;
        span(f, self.base_array_layer, self.array_size)
    }
}
