// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Descriptor set layouts and pipeline layouts.
//!
//! A helper describes its layout with a [`LayoutDescriptor`]: the bindings of one descriptor
//! set plus the push constant ranges. [`PipelineLayout::new`] turns that description into the
//! two Vulkan objects, and keeps the description so that a helper can tell whether its layout
//! is still current.

use crate::{
    device::PipelineDevice,
    pipeline::graphics::state::{DescriptorBinding, LayoutDescriptor},
};
use ash::{prelude::VkResult, vk};
use smallvec::SmallVec;
use std::{fmt, sync::Arc};

/// A descriptor set layout. Destroyed when dropped.
pub struct DescriptorSetLayout {
    device: Arc<dyn PipelineDevice>,
    handle: vk::DescriptorSetLayout,
}

impl DescriptorSetLayout {
    pub fn new(
        device: Arc<dyn PipelineDevice>,
        flags: vk::DescriptorSetLayoutCreateFlags,
        bindings: &[DescriptorBinding],
    ) -> VkResult<Self> {
        let bindings_vk: SmallVec<[_; 4]> =
            bindings.iter().map(|binding| binding.to_vk()).collect();
        let create_info = vk::DescriptorSetLayoutCreateInfo::default()
            .flags(flags)
            .bindings(&bindings_vk);

        let handle = unsafe { device.create_descriptor_set_layout(&create_info)? };

        Ok(DescriptorSetLayout { device, handle })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.handle
    }
}

impl Drop for DescriptorSetLayout {
    #[inline]
    fn drop(&mut self) {
        unsafe { self.device.destroy_descriptor_set_layout(self.handle) };
    }
}

impl fmt::Debug for DescriptorSetLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Vulkan descriptor set layout {:?}>", self.handle)
    }
}

/// A pipeline layout, together with the descriptor set layout it was built from. Destroyed when
/// dropped.
pub struct PipelineLayout {
    device: Arc<dyn PipelineDevice>,
    handle: vk::PipelineLayout,
    descriptor: LayoutDescriptor,
    // Must outlive `handle`.
    _set_layout: DescriptorSetLayout,
}

impl PipelineLayout {
    /// Creates a descriptor set layout from `descriptor.bindings`, then a pipeline layout using
    /// it and `descriptor.push_constant_ranges`.
    pub fn new(device: Arc<dyn PipelineDevice>, descriptor: &LayoutDescriptor) -> VkResult<Self> {
        let set_layout = DescriptorSetLayout::new(
            device.clone(),
            descriptor.set_layout_flags,
            &descriptor.bindings,
        )?;

        let set_layouts_vk = [set_layout.handle()];
        let push_constant_ranges_vk: SmallVec<[_; 2]> = descriptor
            .push_constant_ranges
            .iter()
            .map(|range| range.to_vk())
            .collect();
        let create_info = vk::PipelineLayoutCreateInfo::default()
            .flags(descriptor.flags)
            .set_layouts(&set_layouts_vk)
            .push_constant_ranges(&push_constant_ranges_vk);

        let handle = unsafe { device.create_pipeline_layout(&create_info)? };
        log::debug!("created pipeline layout {:?}", handle);

        Ok(PipelineLayout {
            device,
            handle,
            descriptor: descriptor.clone(),
            _set_layout: set_layout,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineLayout {
        self.handle
    }

    /// Returns the description the layout was built from.
    #[inline]
    pub fn descriptor(&self) -> &LayoutDescriptor {
        &self.descriptor
    }
}

impl Drop for PipelineLayout {
    #[inline]
    fn drop(&mut self) {
        unsafe { self.device.destroy_pipeline_layout(self.handle) };
    }
}

impl fmt::Debug for PipelineLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineLayout")
            .field("handle", &self.handle)
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Returns the layout a helper binds: `external` if set, otherwise `owned`, which is first
/// recreated if it is missing or was built from another descriptor.
pub(crate) fn resolve_layout(
    device: &Arc<dyn PipelineDevice>,
    external: Option<&PipelineLayout>,
    owned: &mut Option<PipelineLayout>,
    descriptor: &LayoutDescriptor,
) -> VkResult<vk::PipelineLayout> {
    if let Some(external) = external {
        return Ok(external.handle());
    }

    if let Some(current) = owned
        .as_ref()
        .filter(|current| current.descriptor() == descriptor)
    {
        return Ok(current.handle());
    }

    let layout = PipelineLayout::new(device.clone(), descriptor)?;
    let handle = layout.handle();
    *owned = Some(layout);

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::PipelineLayout;
    use crate::{
        pipeline::graphics::state::{DescriptorBinding, LayoutDescriptor, PushConstantRange},
        tests::{DUPLICATE_BINDING, PUSH_CONSTANT_SIZE},
    };
    use ash::vk;

    #[test]
    fn layout_from_descriptor() {
        let (fixture, device) = fixture!();
        let before = device.live_handles();

        let descriptor = LayoutDescriptor {
            push_constant_ranges: vec![PushConstantRange {
                stages: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: 16,
            }],
            ..LayoutDescriptor::bindings(fixture.graphics_bindings().iter().copied())
        };
        let layout = PipelineLayout::new(fixture.device().clone(), &descriptor).unwrap();
        assert_eq!(layout.descriptor(), &descriptor);
        // The set layout and the pipeline layout.
        assert_eq!(device.live_handles(), before + 2);

        drop(layout);
        assert_eq!(device.live_handles(), before);
    }

    #[test]
    fn duplicate_binding() {
        let (fixture, _device) = fixture!();
        let binding = DescriptorBinding::new(
            0,
            vk::DescriptorType::SAMPLER,
            vk::ShaderStageFlags::FRAGMENT,
        );

        fixture.monitor().set_desired_error(DUPLICATE_BINDING);
        let result = PipelineLayout::new(
            fixture.device().clone(),
            &LayoutDescriptor::bindings([binding, binding]),
        );
        assert_eq!(
            result.err(),
            Some(vk::Result::ERROR_VALIDATION_FAILED_EXT),
        );
        fixture.monitor().verify_found();
    }

    #[test]
    fn empty_push_constant_range() {
        let (fixture, device) = fixture!();
        let before = device.live_handles();

        fixture.monitor().set_desired_error(PUSH_CONSTANT_SIZE);
        let result = PipelineLayout::new(
            fixture.device().clone(),
            &LayoutDescriptor {
                push_constant_ranges: vec![PushConstantRange {
                    stages: vk::ShaderStageFlags::FRAGMENT,
                    offset: 0,
                    size: 0,
                }],
                ..Default::default()
            },
        );
        assert!(result.is_err());
        fixture.monitor().verify_found();
        // The set layout created first is released again.
        assert_eq!(device.live_handles(), before);
    }
}
