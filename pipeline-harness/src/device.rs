// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The object-creation entry points the harness drives.
//!
//! Everything the harness does to a device goes through [`PipelineDevice`]. The trait takes raw
//! `ash` create-info structs and returns raw results: it neither checks nor interprets anything.
//! Validation is the business of whatever sits behind it, normally the validation layer loaded
//! into an [`ash::Device`], which reports through the debug messenger to the
//! [`ErrorMonitor`](crate::debug::ErrorMonitor).

use ash::{prelude::VkResult, vk};

/// Object creation and destruction on a logical device.
///
/// # Safety
///
/// Every method has the safety requirements of the Vulkan command it forwards to: create-infos
/// must be valid for reads, including everything reachable through their pointers, and handles
/// must have been created by the same device.
pub trait PipelineDevice {
    unsafe fn create_shader_module(
        &self,
        create_info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule>;

    unsafe fn destroy_shader_module(&self, shader_module: vk::ShaderModule);

    unsafe fn create_descriptor_set_layout(
        &self,
        create_info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout>;

    unsafe fn destroy_descriptor_set_layout(&self, set_layout: vk::DescriptorSetLayout);

    unsafe fn create_pipeline_layout(
        &self,
        create_info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout>;

    unsafe fn destroy_pipeline_layout(&self, pipeline_layout: vk::PipelineLayout);

    unsafe fn create_pipeline_cache(
        &self,
        create_info: &vk::PipelineCacheCreateInfo<'_>,
    ) -> VkResult<vk::PipelineCache>;

    unsafe fn destroy_pipeline_cache(&self, pipeline_cache: vk::PipelineCache);

    unsafe fn create_render_pass(
        &self,
        create_info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass>;

    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// Creates a single graphics pipeline. `pipeline_cache` may be null.
    unsafe fn create_graphics_pipeline(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline>;

    /// Creates a single compute pipeline. `pipeline_cache` may be null.
    unsafe fn create_compute_pipeline(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_info: &vk::ComputePipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline>;

    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline);
}

impl PipelineDevice for ash::Device {
    #[inline]
    unsafe fn create_shader_module(
        &self,
        create_info: &vk::ShaderModuleCreateInfo<'_>,
    ) -> VkResult<vk::ShaderModule> {
        ash::Device::create_shader_module(self, create_info, None)
    }

    #[inline]
    unsafe fn destroy_shader_module(&self, shader_module: vk::ShaderModule) {
        ash::Device::destroy_shader_module(self, shader_module, None)
    }

    #[inline]
    unsafe fn create_descriptor_set_layout(
        &self,
        create_info: &vk::DescriptorSetLayoutCreateInfo<'_>,
    ) -> VkResult<vk::DescriptorSetLayout> {
        ash::Device::create_descriptor_set_layout(self, create_info, None)
    }

    #[inline]
    unsafe fn destroy_descriptor_set_layout(&self, set_layout: vk::DescriptorSetLayout) {
        ash::Device::destroy_descriptor_set_layout(self, set_layout, None)
    }

    #[inline]
    unsafe fn create_pipeline_layout(
        &self,
        create_info: &vk::PipelineLayoutCreateInfo<'_>,
    ) -> VkResult<vk::PipelineLayout> {
        ash::Device::create_pipeline_layout(self, create_info, None)
    }

    #[inline]
    unsafe fn destroy_pipeline_layout(&self, pipeline_layout: vk::PipelineLayout) {
        ash::Device::destroy_pipeline_layout(self, pipeline_layout, None)
    }

    #[inline]
    unsafe fn create_pipeline_cache(
        &self,
        create_info: &vk::PipelineCacheCreateInfo<'_>,
    ) -> VkResult<vk::PipelineCache> {
        ash::Device::create_pipeline_cache(self, create_info, None)
    }

    #[inline]
    unsafe fn destroy_pipeline_cache(&self, pipeline_cache: vk::PipelineCache) {
        ash::Device::destroy_pipeline_cache(self, pipeline_cache, None)
    }

    #[inline]
    unsafe fn create_render_pass(
        &self,
        create_info: &vk::RenderPassCreateInfo<'_>,
    ) -> VkResult<vk::RenderPass> {
        ash::Device::create_render_pass(self, create_info, None)
    }

    #[inline]
    unsafe fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        ash::Device::destroy_render_pass(self, render_pass, None)
    }

    unsafe fn create_graphics_pipeline(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_info: &vk::GraphicsPipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        ash::Device::create_graphics_pipelines(
            self,
            pipeline_cache,
            std::slice::from_ref(create_info),
            None,
        )
        .map(|pipelines| pipelines[0])
        .map_err(|(_, err)| err)
    }

    unsafe fn create_compute_pipeline(
        &self,
        pipeline_cache: vk::PipelineCache,
        create_info: &vk::ComputePipelineCreateInfo<'_>,
    ) -> VkResult<vk::Pipeline> {
        ash::Device::create_compute_pipelines(
            self,
            pipeline_cache,
            std::slice::from_ref(create_info),
            None,
        )
        .map(|pipelines| pipelines[0])
        .map_err(|(_, err)| err)
    }

    #[inline]
    unsafe fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        ash::Device::destroy_pipeline(self, pipeline, None)
    }
}
