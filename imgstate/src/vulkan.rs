//! Vulkan backend.
use crate::{
    backend::Backend,
    ledger::ImageLayouts,
    range::{AspectMask, SubresourceRange, REMAINING},
    record::{ResourceId, ResourceRecord},
    recorder::TransitionRequest,
    region::ImageRegionState,
};
use ash::vk;
use fxhash::FxHashMap;
use tracing::{error, trace};

const KNOWN_LAYOUTS: &[vk::ImageLayout] = &[
    vk::ImageLayout::UNDEFINED,
    vk::ImageLayout::GENERAL,
    vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
    vk::ImageLayout::TRANSFER_DST_OPTIMAL,
    vk::ImageLayout::PREINITIALIZED,
    vk::ImageLayout::DEPTH_READ_ONLY_STENCIL_ATTACHMENT_OPTIMAL,
    vk::ImageLayout::DEPTH_ATTACHMENT_STENCIL_READ_ONLY_OPTIMAL,
    vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
    vk::ImageLayout::DEPTH_READ_ONLY_OPTIMAL,
    vk::ImageLayout::STENCIL_ATTACHMENT_OPTIMAL,
    vk::ImageLayout::STENCIL_READ_ONLY_OPTIMAL,
    vk::ImageLayout::READ_ONLY_OPTIMAL,
    vk::ImageLayout::ATTACHMENT_OPTIMAL,
    vk::ImageLayout::PRESENT_SRC_KHR,
    vk::ImageLayout::SHARED_PRESENT_KHR,
];

pub fn is_depth_and_stencil_format(fmt: vk::Format) -> bool {
    matches!(
        fmt,
        vk::Format::D16_UNORM_S8_UINT | vk::Format::D24_UNORM_S8_UINT | vk::Format::D32_SFLOAT_S8_UINT
    )
}

pub fn is_depth_only_format(fmt: vk::Format) -> bool {
    matches!(
        fmt,
        vk::Format::D16_UNORM | vk::Format::X8_D24_UNORM_PACK32 | vk::Format::D32_SFLOAT
    )
}

pub fn is_stencil_only_format(fmt: vk::Format) -> bool {
    matches!(fmt, vk::Format::S8_UINT)
}

/// The aspects tracked for an image of the given format.
pub fn aspects_for_format(fmt: vk::Format) -> AspectMask {
    if is_depth_only_format(fmt) {
        AspectMask::DEPTH
    } else if is_stencil_only_format(fmt) {
        AspectMask::STENCIL
    } else if is_depth_and_stencil_format(fmt) {
        AspectMask::DEPTH | AspectMask::STENCIL
    } else {
        AspectMask::COLOR
    }
}

/// Maps Vulkan aspect flags to tracked aspects. Memory-plane aspects are not tracked.
pub fn aspect_mask_from_vk(flags: vk::ImageAspectFlags) -> AspectMask {
    // the bit values of the tracked aspects are the Vulkan ones
    AspectMask::from_bits_truncate(flags.as_raw())
}

pub fn aspect_mask_to_vk(mask: AspectMask) -> vk::ImageAspectFlags {
    vk::ImageAspectFlags::from_raw(mask.bits())
}

pub fn range_from_vk(range: &vk::ImageSubresourceRange) -> SubresourceRange {
    SubresourceRange {
        aspect_mask: aspect_mask_from_vk(range.aspect_mask),
        base_mip_level: range.base_mip_level,
        mip_levels: if range.level_count == vk::REMAINING_MIP_LEVELS {
            REMAINING
        } else {
            range.level_count
        },
        base_array_layer: range.base_array_layer,
        array_size: if range.layer_count == vk::REMAINING_ARRAY_LAYERS {
            REMAINING
        } else {
            range.layer_count
        },
    }
}

pub fn range_to_vk(range: &SubresourceRange) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: aspect_mask_to_vk(range.aspect_mask),
        base_mip_level: range.base_mip_level,
        level_count: if range.mip_levels == REMAINING {
            vk::REMAINING_MIP_LEVELS
        } else {
            range.mip_levels
        },
        base_array_layer: range.base_array_layer,
        layer_count: if range.array_size == REMAINING {
            vk::REMAINING_ARRAY_LAYERS
        } else {
            range.array_size
        },
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////

/// Tracks `vk::ImageLayout`s of Vulkan images.
///
/// The backend never calls into the device: barriers needed to restore initial contents are
/// queued and handed out by [`take_pending_barriers`](Self::take_pending_barriers).
#[derive(Debug, Default)]
pub struct VulkanBackend {
    images: FxHashMap<ResourceId, vk::Image>,
    handles: FxHashMap<vk::Image, ResourceId>,
    pending_barriers: Vec<vk::ImageMemoryBarrier>,
}

impl VulkanBackend {
    pub fn new() -> VulkanBackend {
        Self::default()
    }

    /// Associates a tracked resource with its Vulkan handle.
    pub fn register_image(&mut self, id: ResourceId, handle: vk::Image) {
        self.images.insert(id, handle);
        self.handles.insert(handle, id);
    }

    pub fn image_handle(&self, id: ResourceId) -> Option<vk::Image> {
        self.images.get(&id).copied()
    }

    pub fn image_id(&self, handle: vk::Image) -> Option<ResourceId> {
        self.handles.get(&handle).copied()
    }

    /// Translates intercepted image barriers into transition requests.
    ///
    /// Barriers on images that were never registered are skipped.
    pub fn transition_requests(&self, barriers: &[vk::ImageMemoryBarrier]) -> Vec<TransitionRequest<vk::ImageLayout>> {
        barriers
            .iter()
            .filter_map(|barrier| {
                let Some(resource) = self.image_id(barrier.image) else {
                    error!(image = ?barrier.image, "barrier on an unknown image");
                    return None;
                };
                Some(TransitionRequest {
                    resource,
                    range: range_from_vk(&barrier.subresource_range),
                    old: barrier.old_layout,
                    new: barrier.new_layout,
                })
            })
            .collect()
    }

    /// Builds the layout transition barrier for a ledger entry. An untransitioned prior state
    /// becomes `UNDEFINED`.
    pub fn image_barrier(&self, id: ResourceId, region: &ImageRegionState<vk::ImageLayout>) -> Option<vk::ImageMemoryBarrier> {
        let image = self.image_handle(id)?;
        Some(vk::ImageMemoryBarrier {
            src_access_mask: vk::AccessFlags::MEMORY_WRITE,
            dst_access_mask: vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
            old_layout: region.old.unwrap_or(vk::ImageLayout::UNDEFINED),
            new_layout: region.new,
            src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
            image,
            subresource_range: range_to_vk(&region.range),
            ..Default::default()
        })
    }

    /// Builds the barriers for a list of transitions, e.g. the result of
    /// `ResourceManager::apply_transitions`. Transitions of unregistered images are skipped.
    pub fn image_barriers(&self, transitions: &[(ResourceId, ImageRegionState<vk::ImageLayout>)]) -> Vec<vk::ImageMemoryBarrier> {
        transitions
            .iter()
            .filter_map(|(id, region)| {
                let barrier = self.image_barrier(*id, region);
                if barrier.is_none() {
                    error!(?id, "no image handle for resource");
                }
                barrier
            })
            .collect()
    }

    /// Barriers queued by `apply_initial_state` since the last call.
    pub fn take_pending_barriers(&mut self) -> Vec<vk::ImageMemoryBarrier> {
        std::mem::take(&mut self.pending_barriers)
    }
}

impl Backend for VulkanBackend {
    type State = vk::ImageLayout;
    /// Layouts of the image when the frame started.
    type InitialContents = Vec<ImageRegionState<vk::ImageLayout>>;

    fn initial_state(&self) -> vk::ImageLayout {
        vk::ImageLayout::UNDEFINED
    }

    fn replay_state(&self, state: vk::ImageLayout) -> vk::ImageLayout {
        // there is no swapchain to present to on replay
        if state == vk::ImageLayout::PRESENT_SRC_KHR {
            vk::ImageLayout::GENERAL
        } else {
            state
        }
    }

    fn state_to_raw(&self, state: vk::ImageLayout) -> u32 {
        state.as_raw() as u32
    }

    fn state_from_raw(&self, raw: u32) -> Option<vk::ImageLayout> {
        let layout = vk::ImageLayout::from_raw(raw as i32);
        KNOWN_LAYOUTS.contains(&layout).then_some(layout)
    }

    fn prepare_initial_state(
        &mut self,
        id: ResourceId,
        record: &ResourceRecord,
        layouts: Option<&ImageLayouts<vk::ImageLayout>>,
    ) -> Option<Self::InitialContents> {
        let layouts = layouts?;
        trace!(?id, name = record.name(), "snapshotting image layouts");
        Some(layouts.states().entries().to_vec())
    }

    fn apply_initial_state(&mut self, live: ResourceId, contents: &Self::InitialContents) {
        let Some(image) = self.image_handle(live) else {
            error!(?live, "no image handle to restore initial layouts");
            return;
        };
        for region in contents {
            if region.new == vk::ImageLayout::UNDEFINED {
                continue;
            }
            self.pending_barriers.push(vk::ImageMemoryBarrier {
                dst_access_mask: vk::AccessFlags::MEMORY_READ | vk::AccessFlags::MEMORY_WRITE,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: region.new,
                src_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                dst_queue_family_index: vk::QUEUE_FAMILY_IGNORED,
                image,
                subresource_range: range_to_vk(&region.range),
                ..Default::default()
            });
        }
    }

    fn release_resource(&mut self, id: ResourceId) {
        if let Some(handle) = self.images.remove(&id) {
            self.handles.remove(&handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vk_ranges_keep_remaining_sentinels() {
        let vk_range = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
            base_mip_level: 1,
            level_count: vk::REMAINING_MIP_LEVELS,
            base_array_layer: 0,
            layer_count: 2,
        };
        let range = range_from_vk(&vk_range);
        assert_eq!(range.aspect_mask, AspectMask::DEPTH | AspectMask::STENCIL);
        assert_eq!(range.mip_levels, REMAINING);
        assert_eq!(range.array_size, 2);
        let back = range_to_vk(&range);
        assert_eq!(back.aspect_mask, vk_range.aspect_mask);
        assert_eq!(back.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(back.layer_count, 2);
    }

    #[test]
    fn layout_raw_values() {
        let backend = VulkanBackend::new();
        for &layout in KNOWN_LAYOUTS {
            assert_eq!(backend.state_from_raw(backend.state_to_raw(layout)), Some(layout));
        }
        assert_eq!(backend.state_from_raw(12345), None);
        assert_eq!(backend.state_from_raw(u32::MAX), None);
    }

    #[test]
    fn format_aspects() {
        assert_eq!(aspects_for_format(vk::Format::R8G8B8A8_UNORM), AspectMask::COLOR);
        assert_eq!(aspects_for_format(vk::Format::D32_SFLOAT), AspectMask::DEPTH);
        assert_eq!(
            aspects_for_format(vk::Format::D24_UNORM_S8_UINT),
            AspectMask::DEPTH | AspectMask::STENCIL
        );
    }
}
