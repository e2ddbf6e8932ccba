// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describing and creating compute pipelines.
//!
//! A compute pipeline has a single shader stage and no fixed-function state, so a
//! [`ComputePipelineHelper`] is the graphics helper reduced to its stage, its layout and its
//! cache. It follows the same late-bind and create contract.
//!
//! It also has [`override_skip`](ComputePipelineHelper::override_skip), which the graphics helper
//! does not: a test that made creation unsafe to attempt sets it, and the oneshot protocol then
//! skips creation.

use crate::{
    aliasable_box::AliasableBox,
    fixture::TestFixture,
    pipeline::{
        cache::{PipelineCache, PipelineCacheCreateInfo},
        graphics::state::LayoutDescriptor,
        layout::{self, PipelineLayout},
        Pipeline,
    },
    shader::ShaderStage,
    HarnessError,
};
use ash::{prelude::VkResult, vk};
use std::sync::Arc;

/// A fully populated, freely overridable description of one compute pipeline.
#[derive(Debug)]
pub struct ComputePipelineHelper<'a> {
    fixture: &'a TestFixture,

    /// The default value is the fixture's compute shader.
    pub stage: ShaderStage,

    /// The default value has the fixture's compute bindings and no push constants.
    pub layout: LayoutDescriptor,

    /// A pipeline layout to use instead of creating one from `layout`.
    ///
    /// The default value is `None`.
    pub pipeline_layout: Option<Arc<PipelineLayout>>,

    /// The default value is empty.
    pub flags: vk::PipelineCreateFlags,

    /// Used whenever the helper creates its pipeline cache.
    pub cache_create_info: PipelineCacheCreateInfo,

    /// Set by a test to ask the oneshot protocol not to attempt creation at all. The protocol
    /// resets it.
    ///
    /// The default value is `false`.
    pub override_skip: bool,

    owned_layout: Option<PipelineLayout>,
    pipeline_cache: Option<PipelineCache>,
    pipeline: Option<Pipeline>,
    binding: Option<AliasableBox<Binding>>,
}

#[derive(Debug, Default)]
struct Binding {
    create_info: vk::ComputePipelineCreateInfo<'static>,
    stage: Option<ShaderStage>,
    module_info: vk::ShaderModuleCreateInfo<'static>,
}

impl<'a> ComputePipelineHelper<'a> {
    /// Returns a helper describing a valid compute pipeline.
    ///
    /// Creates the default shader module. Nothing else is created until the first binding.
    pub fn new(fixture: &'a TestFixture) -> Result<Self, HarnessError> {
        let stage =
            fixture.create_shader_stage(fixture.compute_source(), vk::ShaderStageFlags::COMPUTE)?;

        Ok(ComputePipelineHelper {
            fixture,
            stage,
            layout: LayoutDescriptor::bindings(fixture.compute_bindings().iter().copied()),
            pipeline_layout: None,
            flags: vk::PipelineCreateFlags::empty(),
            cache_create_info: PipelineCacheCreateInfo::default(),
            override_skip: false,
            owned_layout: None,
            pipeline_cache: None,
            pipeline: None,
            binding: None,
        })
    }

    #[inline]
    pub fn fixture(&self) -> &'a TestFixture {
        self.fixture
    }

    /// Creates the pipeline cache from `cache_create_info`, replacing any previous one.
    pub fn init_pipeline_cache(&mut self) -> VkResult<()> {
        self.pipeline_cache = None;
        self.pipeline_cache = Some(PipelineCache::new(
            self.fixture.device().clone(),
            &self.cache_create_info,
        )?);

        Ok(())
    }

    /// Points the stage and layout of the create info at copies of the current fields.
    ///
    /// Also creates the pipeline layout from `layout` if needed. An error is the result of that
    /// creation, and leaves the previous binding in place.
    pub fn late_bind_pipeline_info(&mut self) -> VkResult<()> {
        let layout = layout::resolve_layout(
            self.fixture.device(),
            self.pipeline_layout.as_deref(),
            &mut self.owned_layout,
            &self.layout,
        )?;

        let mut binding = self
            .binding
            .take()
            .unwrap_or_else(|| AliasableBox::new(Binding::default()));
        let b = &mut *binding;

        let stage = b.stage.insert(self.stage.clone());
        b.module_info = stage.module_create_info();
        b.create_info = vk::ComputePipelineCreateInfo {
            flags: self.flags,
            stage: stage.stage_create_info(&b.module_info),
            layout,
            base_pipeline_index: -1,
            ..Default::default()
        };

        log::trace!("bound compute pipeline info: {:?} stage", self.stage.stage);

        self.binding = Some(binding);

        Ok(())
    }

    /// Creates the pipeline, with the same contract as
    /// [`GraphicsPipelineHelper::create_graphics_pipeline`].
    ///
    /// `override_skip` is not looked at here.
    ///
    /// [`GraphicsPipelineHelper::create_graphics_pipeline`]: crate::pipeline::graphics::GraphicsPipelineHelper::create_graphics_pipeline
    pub fn create_compute_pipeline(&mut self, do_late_bind: bool, no_cache: bool) -> vk::Result {
        self.pipeline = None;

        if do_late_bind || self.binding.is_none() {
            if let Err(err) = self.late_bind_pipeline_info() {
                return err;
            }
        }

        let pipeline_cache = if no_cache {
            vk::PipelineCache::null()
        } else {
            if self.pipeline_cache.is_none() {
                if let Err(err) = self.init_pipeline_cache() {
                    return err;
                }
            }

            self.pipeline_cache
                .as_ref()
                .map_or(vk::PipelineCache::null(), PipelineCache::handle)
        };

        let Some(binding) = self.binding.as_deref() else {
            return vk::Result::ERROR_INITIALIZATION_FAILED;
        };
        let device = self.fixture.device();

        let result = unsafe { device.create_compute_pipeline(pipeline_cache, &binding.create_info) };
        log::debug!("vkCreateComputePipelines: {:?}", result);

        match result {
            Ok(handle) => {
                self.pipeline = Some(unsafe {
                    Pipeline::from_handle(device.clone(), handle, vk::PipelineBindPoint::COMPUTE)
                });

                vk::Result::SUCCESS
            }
            Err(err) => err,
        }
    }

    /// Returns the created pipeline, or null if there is none.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
            .as_ref()
            .map_or(vk::Pipeline::null(), Pipeline::handle)
    }

    #[inline]
    pub fn pipeline(&self) -> Option<&Pipeline> {
        self.pipeline.as_ref()
    }

    /// Returns the pipeline layout in use: the override if set, otherwise the one created from
    /// `layout` at the last binding, or null.
    pub fn pipeline_layout_handle(&self) -> vk::PipelineLayout {
        self.pipeline_layout
            .as_deref()
            .or(self.owned_layout.as_ref())
            .map_or(vk::PipelineLayout::null(), PipelineLayout::handle)
    }

    /// Returns the create info as of the last binding.
    #[inline]
    pub fn bound_create_info(&self) -> Option<&vk::ComputePipelineCreateInfo<'static>> {
        self.binding.as_deref().map(|binding| &binding.create_info)
    }
}
