// Copyright (c) 2017 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describing and creating graphics pipelines.
//!
//! A [`GraphicsPipelineHelper`] starts out fully populated: a minimal vertex and fragment shader,
//! the fixture's default descriptor bindings and render target, and the `Default` value of every
//! fixed-function record in [`state`]. A test changes only what it probes, then creates.
//!
//! Creation happens in two steps:
//!
//! 1. *Late binding* copies the current records into a binding block owned by the helper and
//!    points every pointer/count pair of the top-level `VkGraphicsPipelineCreateInfo` at those
//!    copies.
//! 2. *Creation* hands the bound create info to the device.
//!
//! [`create_graphics_pipeline`](GraphicsPipelineHelper::create_graphics_pipeline) normally does
//! both, but binding can be skipped. The bound create info then still describes the records as
//! they were at the last binding, which lets a test present a deliberately stale description to
//! the implementation. The block holds its own copies, so a stale binding never dangles.
//!
//! # Pipeline libraries
//!
//! The `init_*_lib_info` methods turn the helper into the description of one kind of graphics
//! pipeline library. In that mode only the records that belong to the library kind are bound;
//! the others stay in the helper untouched but are passed as null. Libraries are linked with
//! [`link_libraries`](crate::pipeline::library::link_libraries).

use self::state::{
    ColorBlendState, DepthStencilState, DynamicState, InputAssemblyState, LayoutDescriptor,
    MultisampleState, RasterizationState, RenderingState, Scissor, TessellationState,
    VertexInputState, Viewport, ViewportState,
};
use crate::{
    aliasable_box::AliasableBox,
    fixture::TestFixture,
    pipeline::{
        cache::{PipelineCache, PipelineCacheCreateInfo},
        layout::{self, PipelineLayout},
        Pipeline,
    },
    shader::{ShaderSource, ShaderStage},
    HarnessError,
};
use ash::{prelude::VkResult, vk};
use std::{ffi::c_void, ptr, sync::Arc};

pub mod state;

type LibraryParts = vk::GraphicsPipelineLibraryFlagsEXT;

/// A fully populated, freely overridable description of one graphics pipeline.
///
/// Every public field is an override point. A fixed-function slot set to `None` is passed as a
/// null pointer.
#[derive(Debug)]
pub struct GraphicsPipelineHelper<'a> {
    fixture: &'a TestFixture,

    /// The stages, in the order they are given to the implementation.
    ///
    /// The default value is the fixture's vertex and fragment shaders.
    pub shader_stages: Vec<ShaderStage>,

    /// The default value is [`VertexInputState::default()`].
    pub vertex_input_state: Option<VertexInputState>,

    /// The default value is [`InputAssemblyState::default()`].
    pub input_assembly_state: Option<InputAssemblyState>,

    /// The default value is `None`.
    pub tessellation_state: Option<TessellationState>,

    /// The default value is one viewport and one scissor covering the fixture's extent.
    pub viewport_state: Option<ViewportState>,

    /// The default value is [`RasterizationState::default()`].
    pub rasterization_state: Option<RasterizationState>,

    /// The default value is [`MultisampleState::default()`].
    pub multisample_state: Option<MultisampleState>,

    /// The default value is `None`, as the default render target has no depth attachment.
    pub depth_stencil_state: Option<DepthStencilState>,

    /// The default value has one attachment state per color attachment of the render target.
    pub color_blend_state: Option<ColorBlendState>,

    /// The default value is `None`. [`add_dynamic_state`](Self::add_dynamic_state) creates it.
    pub dynamic_state: Option<DynamicState>,

    /// The layout the helper creates its pipeline layout from, unless `pipeline_layout` is set.
    ///
    /// The default value has the fixture's graphics bindings and no push constants.
    pub layout: LayoutDescriptor,

    /// A pipeline layout to use instead of creating one from `layout`.
    ///
    /// The default value is `None`.
    pub pipeline_layout: Option<Arc<PipelineLayout>>,

    /// The default value is empty. The `init_*_lib_info` methods add `LIBRARY_KHR`.
    pub flags: vk::PipelineCreateFlags,

    /// The default value is the fixture's render pass. Set it to null to use `rendering`.
    pub render_pass: vk::RenderPass,

    /// The default value is 0.
    pub subpass: u32,

    /// Chained as `VkPipelineRenderingCreateInfo` when set.
    ///
    /// The default value is `None`.
    pub rendering: Option<RenderingState>,

    /// The library parts this helper describes. Empty means a complete pipeline.
    ///
    /// The default value is empty.
    pub library_flags: vk::GraphicsPipelineLibraryFlagsEXT,

    /// Pipeline libraries to link into this pipeline, chained as
    /// `VkPipelineLibraryCreateInfoKHR` when not empty.
    ///
    /// The default value is empty.
    pub libraries: Vec<vk::Pipeline>,

    /// Used whenever the helper creates its pipeline cache.
    pub cache_create_info: PipelineCacheCreateInfo,

    default_vertex_stage: ShaderStage,
    owned_layout: Option<PipelineLayout>,
    pipeline_cache: Option<PipelineCache>,
    pipeline: Option<Pipeline>,
    binding: Option<AliasableBox<Binding>>,
}

/// Storage for everything the top-level create info points to.
///
/// Lives on the heap so that the pointers survive moves of the helper. Arrays are cleared and
/// refilled in place when rebinding, which keeps their addresses when nothing changed.
#[derive(Debug, Default)]
struct Binding {
    create_info: vk::GraphicsPipelineCreateInfo<'static>,

    stages: Vec<ShaderStage>,
    module_infos: Vec<vk::ShaderModuleCreateInfo<'static>>,
    stage_infos: Vec<vk::PipelineShaderStageCreateInfo<'static>>,

    vertex_bindings: Vec<vk::VertexInputBindingDescription>,
    vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    vertex_input: vk::PipelineVertexInputStateCreateInfo<'static>,
    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    tessellation: vk::PipelineTessellationStateCreateInfo<'static>,
    viewports: Vec<vk::Viewport>,
    scissors: Vec<vk::Rect2D>,
    viewport: vk::PipelineViewportStateCreateInfo<'static>,
    rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    sample_mask: Vec<u32>,
    multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    depth_stencil: vk::PipelineDepthStencilStateCreateInfo<'static>,
    color_blend_attachments: Vec<vk::PipelineColorBlendAttachmentState>,
    color_blend: vk::PipelineColorBlendStateCreateInfo<'static>,
    dynamic_states: Vec<vk::DynamicState>,
    dynamic: vk::PipelineDynamicStateCreateInfo<'static>,

    rendering_formats: Vec<vk::Format>,
    rendering: vk::PipelineRenderingCreateInfo<'static>,
    library_info: vk::GraphicsPipelineLibraryCreateInfoEXT<'static>,
    libraries: Vec<vk::Pipeline>,
    link_info: vk::PipelineLibraryCreateInfoKHR<'static>,
}

impl<'a> GraphicsPipelineHelper<'a> {
    /// Returns a helper describing a valid pipeline for the fixture's render target.
    ///
    /// Creates the default shader modules. Nothing else is created until the first binding.
    pub fn new(fixture: &'a TestFixture) -> Result<Self, HarnessError> {
        let vertex_stage =
            fixture.create_shader_stage(fixture.vertex_source(), vk::ShaderStageFlags::VERTEX)?;
        let fragment_stage = fixture
            .create_shader_stage(fixture.fragment_source(), vk::ShaderStageFlags::FRAGMENT)?;
        let [width, height] = fixture.extent();

        Ok(GraphicsPipelineHelper {
            fixture,
            shader_stages: vec![vertex_stage.clone(), fragment_stage],
            vertex_input_state: Some(VertexInputState::default()),
            input_assembly_state: Some(InputAssemblyState::default()),
            tessellation_state: None,
            viewport_state: Some(ViewportState {
                viewports: vec![Viewport {
                    offset: [0.0, 0.0],
                    extent: [width as f32, height as f32],
                    depth_range: 0.0..=1.0,
                }],
                scissors: vec![Scissor {
                    offset: [0, 0],
                    extent: [width, height],
                }],
                viewport_count: None,
                scissor_count: None,
            }),
            rasterization_state: Some(RasterizationState::default()),
            multisample_state: Some(MultisampleState::default()),
            depth_stencil_state: None,
            color_blend_state: Some(ColorBlendState::new(
                fixture.render_pass().color_attachment_count(),
            )),
            dynamic_state: None,
            layout: LayoutDescriptor::bindings(fixture.graphics_bindings().iter().copied()),
            pipeline_layout: None,
            flags: vk::PipelineCreateFlags::empty(),
            render_pass: fixture.render_pass().handle(),
            subpass: 0,
            rendering: None,
            library_flags: LibraryParts::empty(),
            libraries: Vec::new(),
            cache_create_info: PipelineCacheCreateInfo::default(),
            default_vertex_stage: vertex_stage,
            owned_layout: None,
            pipeline_cache: None,
            pipeline: None,
            binding: None,
        })
    }

    /// Returns the fixture the helper was built against.
    #[inline]
    pub fn fixture(&self) -> &'a TestFixture {
        self.fixture
    }

    /// Replaces the stages with a vertex and a fragment shader compiled from the given sources.
    ///
    /// On a compile failure the stages are left unchanged, and the failure has been reported to
    /// the monitor as [`COMPILE_FAILURE_ID`](crate::fixture::COMPILE_FAILURE_ID).
    pub fn reset_shader_info(
        &mut self,
        vertex_source: &ShaderSource,
        fragment_source: &ShaderSource,
    ) -> Result<(), HarnessError> {
        let vertex_stage = self
            .fixture
            .create_shader_stage(vertex_source, vk::ShaderStageFlags::VERTEX)?;
        let fragment_stage = self
            .fixture
            .create_shader_stage(fragment_source, vk::ShaderStageFlags::FRAGMENT)?;
        self.shader_stages = vec![vertex_stage, fragment_stage];

        Ok(())
    }

    /// Replaces the stages with the fixture's default vertex shader alone, and enables
    /// rasterizer discard so that the pipeline stays valid without a fragment shader.
    pub fn vertex_shader_only(&mut self) {
        self.shader_stages = vec![self.default_vertex_stage.clone()];
        self.rasterization_state
            .get_or_insert_with(Default::default)
            .rasterizer_discard_enable = true;
    }

    /// Describes a vertex input interface library. It has no stages.
    pub fn init_vertex_input_lib_info(&mut self) {
        self.init_library(LibraryParts::VERTEX_INPUT_INTERFACE);
        self.shader_stages.clear();
    }

    /// Describes a pre-rasterization shaders library with the given stages.
    pub fn init_pre_raster_lib_info(&mut self, stages: impl IntoIterator<Item = ShaderStage>) {
        self.init_library(LibraryParts::PRE_RASTERIZATION_SHADERS);
        self.shader_stages = stages.into_iter().collect();
    }

    /// Describes a fragment shader library with the given stages.
    pub fn init_fragment_lib_info(&mut self, stages: impl IntoIterator<Item = ShaderStage>) {
        self.init_library(LibraryParts::FRAGMENT_SHADER);
        self.shader_stages = stages.into_iter().collect();
    }

    /// Describes a fragment output interface library. It has no stages.
    pub fn init_fragment_output_lib_info(&mut self) {
        self.init_library(LibraryParts::FRAGMENT_OUTPUT_INTERFACE);
        self.shader_stages.clear();
    }

    fn init_library(&mut self, parts: LibraryParts) {
        self.library_flags = parts;
        self.flags |= vk::PipelineCreateFlags::LIBRARY_KHR;
    }

    /// Appends `state` to the dynamic states, creating the dynamic state record if there is
    /// none. Adding a state twice makes the description invalid.
    pub fn add_dynamic_state(&mut self, state: vk::DynamicState) {
        self.dynamic_state
            .get_or_insert_with(Default::default)
            .states
            .push(state);
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

    /// Points every pointer/count pair of the top-level create info at copies of the current
    /// records.
    ///
    /// Also creates the pipeline layout from `layout` if there is none yet or `layout` changed
    /// since it was created. An error is the result of that creation, and leaves the previous
    /// binding in place.
    pub fn late_bind_pipeline_info(&mut self) -> VkResult<()> {
        let binds = |parts: LibraryParts| {
            self.library_flags.is_empty() || self.library_flags.intersects(parts)
        };
        let binds_shaders =
            binds(LibraryParts::PRE_RASTERIZATION_SHADERS | LibraryParts::FRAGMENT_SHADER);
        let binds_render_target = binds(
            LibraryParts::PRE_RASTERIZATION_SHADERS
                | LibraryParts::FRAGMENT_SHADER
                | LibraryParts::FRAGMENT_OUTPUT_INTERFACE,
        );
        let binds_vertex_input = binds(LibraryParts::VERTEX_INPUT_INTERFACE);
        let binds_pre_raster = binds(LibraryParts::PRE_RASTERIZATION_SHADERS);
        let binds_fragment = binds(LibraryParts::FRAGMENT_SHADER);
        let binds_multisample =
            binds(LibraryParts::FRAGMENT_SHADER | LibraryParts::FRAGMENT_OUTPUT_INTERFACE);
        let binds_fragment_output = binds(LibraryParts::FRAGMENT_OUTPUT_INTERFACE);

        // Libraries without shaders only get a layout when one is given explicitly.
        let layout = if binds_shaders {
            layout::resolve_layout(
                self.fixture.device(),
                self.pipeline_layout.as_deref(),
                &mut self.owned_layout,
                &self.layout,
            )?
        } else {
            self.pipeline_layout
                .as_deref()
                .map_or(vk::PipelineLayout::null(), PipelineLayout::handle)
        };

        let mut binding = self
            .binding
            .take()
            .unwrap_or_else(|| AliasableBox::new(Binding::default()));
        let b = &mut *binding;

        b.create_info = vk::GraphicsPipelineCreateInfo {
            flags: self.flags,
            layout,
            render_pass: if binds_render_target {
                self.render_pass
            } else {
                vk::RenderPass::null()
            },
            subpass: if binds_render_target { self.subpass } else { 0 },
            base_pipeline_index: -1,
            ..Default::default()
        };

        b.stages.clear();
        b.module_infos.clear();
        b.stage_infos.clear();

        if binds_shaders {
            b.stages.extend(self.shader_stages.iter().cloned());
            b.module_infos
                .extend(b.stages.iter().map(ShaderStage::module_create_info));
            // `module_infos` is not touched again, so the chained pointers stay valid.
            b.stage_infos.extend(
                b.stages
                    .iter()
                    .zip(&b.module_infos)
                    .map(|(stage, module_info)| stage.stage_create_info(module_info)),
            );
        }

        b.create_info.stage_count = b.stage_infos.len() as u32;
        b.create_info.p_stages = ptr_or_null(&b.stage_infos);

        b.vertex_bindings.clear();
        b.vertex_attributes.clear();

        match &self.vertex_input_state {
            Some(state) if binds_vertex_input => {
                b.vertex_bindings
                    .extend(state.bindings.iter().map(|binding| binding.to_vk()));
                b.vertex_attributes
                    .extend(state.attributes.iter().map(|attribute| attribute.to_vk()));
                let (binding_count, p_bindings) =
                    bind_array(&mut b.vertex_bindings, state.binding_count);
                let (attribute_count, p_attributes) =
                    bind_array(&mut b.vertex_attributes, state.attribute_count);
                b.vertex_input = vk::PipelineVertexInputStateCreateInfo {
                    vertex_binding_description_count: binding_count,
                    p_vertex_binding_descriptions: p_bindings,
                    vertex_attribute_description_count: attribute_count,
                    p_vertex_attribute_descriptions: p_attributes,
                    ..Default::default()
                };
                b.create_info.p_vertex_input_state = ptr::addr_of!(b.vertex_input);
            }
            _ => b.create_info.p_vertex_input_state = ptr::null(),
        }

        match self.input_assembly_state {
            Some(state) if binds_vertex_input => {
                b.input_assembly = state.to_vk();
                b.create_info.p_input_assembly_state = ptr::addr_of!(b.input_assembly);
            }
            _ => b.create_info.p_input_assembly_state = ptr::null(),
        }

        match self.tessellation_state {
            Some(state) if binds_pre_raster => {
                b.tessellation = state.to_vk();
                b.create_info.p_tessellation_state = ptr::addr_of!(b.tessellation);
            }
            _ => b.create_info.p_tessellation_state = ptr::null(),
        }

        b.viewports.clear();
        b.scissors.clear();

        match &self.viewport_state {
            Some(state) if binds_pre_raster => {
                b.viewports
                    .extend(state.viewports.iter().map(Viewport::to_vk));
                b.scissors
                    .extend(state.scissors.iter().map(|scissor| scissor.to_vk()));
                let (viewport_count, p_viewports) =
                    bind_array(&mut b.viewports, state.viewport_count);
                let (scissor_count, p_scissors) = bind_array(&mut b.scissors, state.scissor_count);
                b.viewport = vk::PipelineViewportStateCreateInfo {
                    viewport_count,
                    p_viewports,
                    scissor_count,
                    p_scissors,
                    ..Default::default()
                };
                b.create_info.p_viewport_state = ptr::addr_of!(b.viewport);
            }
            _ => b.create_info.p_viewport_state = ptr::null(),
        }

        match self.rasterization_state {
            Some(state) if binds_pre_raster => {
                b.rasterization = state.to_vk();
                b.create_info.p_rasterization_state = ptr::addr_of!(b.rasterization);
            }
            _ => b.create_info.p_rasterization_state = ptr::null(),
        }

        b.sample_mask.clear();

        match &self.multisample_state {
            Some(state) if binds_multisample => {
                b.sample_mask.extend_from_slice(&state.sample_mask);
                b.multisample = state.to_vk();
                b.multisample.p_sample_mask = ptr_or_null(&b.sample_mask);
                b.create_info.p_multisample_state = ptr::addr_of!(b.multisample);
            }
            _ => b.create_info.p_multisample_state = ptr::null(),
        }

        match &self.depth_stencil_state {
            Some(state) if binds_fragment => {
                b.depth_stencil = state.to_vk();
                b.create_info.p_depth_stencil_state = ptr::addr_of!(b.depth_stencil);
            }
            _ => b.create_info.p_depth_stencil_state = ptr::null(),
        }

        b.color_blend_attachments.clear();

        match &self.color_blend_state {
            Some(state) if binds_fragment_output => {
                b.color_blend_attachments
                    .extend(state.attachments.iter().map(|attachment| attachment.to_vk()));
                b.color_blend = state.to_vk();
                b.color_blend.attachment_count = b.color_blend_attachments.len() as u32;
                b.color_blend.p_attachments = ptr_or_null(&b.color_blend_attachments);
                b.create_info.p_color_blend_state = ptr::addr_of!(b.color_blend);
            }
            _ => b.create_info.p_color_blend_state = ptr::null(),
        }

        b.dynamic_states.clear();

        match &self.dynamic_state {
            Some(state) => {
                b.dynamic_states.extend_from_slice(&state.states);
                let (dynamic_state_count, p_dynamic_states) =
                    bind_array(&mut b.dynamic_states, state.count);
                b.dynamic = vk::PipelineDynamicStateCreateInfo {
                    dynamic_state_count,
                    p_dynamic_states,
                    ..Default::default()
                };
                b.create_info.p_dynamic_state = ptr::addr_of!(b.dynamic);
            }
            None => b.create_info.p_dynamic_state = ptr::null(),
        }

        let mut p_next: *const c_void = ptr::null();
        b.libraries.clear();

        if !self.libraries.is_empty() {
            b.libraries.extend_from_slice(&self.libraries);
            b.link_info = vk::PipelineLibraryCreateInfoKHR {
                p_next: p_next as _,
                library_count: b.libraries.len() as u32,
                p_libraries: b.libraries.as_ptr(),
                ..Default::default()
            };
            p_next = ptr::addr_of!(b.link_info).cast();
        }

        if !self.library_flags.is_empty() {
            b.library_info = vk::GraphicsPipelineLibraryCreateInfoEXT {
                p_next: p_next as _,
                flags: self.library_flags,
                ..Default::default()
            };
            p_next = ptr::addr_of!(b.library_info).cast();
        }

        b.rendering_formats.clear();

        if binds_render_target {
            if let Some(state) = &self.rendering {
                b.rendering_formats
                    .extend_from_slice(&state.color_attachment_formats);
                b.rendering = state.to_vk();
                b.rendering.p_next = p_next as _;
                b.rendering.color_attachment_count = b.rendering_formats.len() as u32;
                b.rendering.p_color_attachment_formats = ptr_or_null(&b.rendering_formats);
                p_next = ptr::addr_of!(b.rendering).cast();
            }
        }

        b.create_info.p_next = p_next;

        log::trace!(
            "bound graphics pipeline info: {} stages, library parts {:?}",
            b.create_info.stage_count,
            self.library_flags,
        );

        self.binding = Some(binding);

        Ok(())
    }

    /// Creates the pipeline.
    ///
    /// - If `do_late_bind` is true, or nothing has been bound yet, late-binds first.
    /// - Unless `no_cache` is true, passes the helper's pipeline cache, creating it first if
    ///   needed.
    ///
    /// Exactly one creation call is made, unless binding or cache creation fails first. On
    /// success the new pipeline replaces the previous one; on failure the helper is left without
    /// a pipeline. Either way the result code of the call is returned.
    pub fn create_graphics_pipeline(&mut self, do_late_bind: bool, no_cache: bool) -> vk::Result {
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

        let result = unsafe { device.create_graphics_pipeline(pipeline_cache, &binding.create_info) };
        log::debug!("vkCreateGraphicsPipelines: {:?}", result);

        match result {
            Ok(handle) => {
                self.pipeline = Some(unsafe {
                    Pipeline::from_handle(device.clone(), handle, vk::PipelineBindPoint::GRAPHICS)
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

    /// Takes the created pipeline out of the helper.
    #[inline]
    pub fn take_pipeline(&mut self) -> Option<Pipeline> {
        self.pipeline.take()
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
    pub fn bound_create_info(&self) -> Option<&vk::GraphicsPipelineCreateInfo<'static>> {
        self.binding.as_deref().map(|binding| &binding.create_info)
    }

    /// Returns the create info as of the last binding, for tests that corrupt it on purpose
    /// before creating with `do_late_bind` false.
    ///
    /// # Safety
    ///
    /// - Every pointer in the create info must stay valid for reads until it is rebound.
    #[inline]
    pub unsafe fn bound_create_info_mut(
        &mut self,
    ) -> Option<&mut vk::GraphicsPipelineCreateInfo<'static>> {
        self.binding
            .as_deref_mut()
            .map(|binding| &mut binding.create_info)
    }
}

#[inline]
fn ptr_or_null<T>(slice: &[T]) -> *const T {
    if slice.is_empty() {
        ptr::null()
    } else {
        slice.as_ptr()
    }
}

/// Returns the count and pointer to bind for `array`, padding it with zeroed elements if the
/// count override is larger than a non-empty array.
fn bind_array<T: Clone + Default>(array: &mut Vec<T>, count: Option<u32>) -> (u32, *const T) {
    let count = count.unwrap_or(array.len() as u32);

    if !array.is_empty() && array.len() < count as usize {
        array.resize(count as usize, T::default());
    }

    (count, ptr_or_null(array))
}

#[cfg(test)]
mod tests {
    use super::{
        state::{ColorBlendState, DynamicState, PushConstantRange, RenderingState, TessellationState},
        GraphicsPipelineHelper,
    };
    use crate::{
        fixture::COMPILE_FAILURE_ID,
        pipeline::layout::PipelineLayout,
        shader::ShaderSource,
        tests::{
            BLEND_ATTACHMENT_COUNT, DUPLICATE_DYNAMIC_STATE, LINE_WIDTH, MISSING_VERTEX_STAGE,
        },
    };
    use ash::vk;
    use std::sync::Arc;

    #[test]
    fn default_pipeline_is_valid() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();

        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        assert_ne!(helper.handle(), vk::Pipeline::null());
        assert!(fixture.monitor().received_messages().is_empty());

        let observed = device.observed();
        assert_eq!(observed.graphics_pipeline_calls, 1);
        assert_eq!(observed.stages.len(), 2);
        assert_eq!(observed.layout, helper.pipeline_layout_handle());
        assert_ne!(observed.pipeline_cache, vk::PipelineCache::null());

        drop(helper);
        // Only the render target is left.
        assert_eq!(device.live_handles(), 1);
    }

    #[test]
    fn first_create_binds() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();

        assert!(helper.bound_create_info().is_none());
        assert_eq!(
            helper.create_graphics_pipeline(false, true),
            vk::Result::SUCCESS,
        );
        assert!(helper.bound_create_info().is_some());
        assert_eq!(device.observed().pipeline_cache, vk::PipelineCache::null());
    }

    #[test]
    fn rebinding_is_idempotent() {
        let (fixture, _device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.add_dynamic_state(vk::DynamicState::VIEWPORT);
        helper.tessellation_state = Some(TessellationState::default());

        let snapshot = |helper: &GraphicsPipelineHelper<'_>| {
            let binding = helper.binding.as_deref().unwrap();

            format!(
                "{:?} {:?} {:?} {:?} {:?} {:?} {:?}",
                binding.create_info,
                binding.stage_infos,
                binding.vertex_input,
                binding.viewport,
                binding.multisample,
                binding.color_blend,
                binding.dynamic,
            )
        };

        helper.late_bind_pipeline_info().unwrap();
        let first = snapshot(&helper);
        helper.late_bind_pipeline_info().unwrap();
        let second = snapshot(&helper);
        assert_eq!(first, second);

        let create_info = helper.bound_create_info().unwrap();
        assert_eq!(create_info.stage_count, 2);
        assert!(!create_info.p_tessellation_state.is_null());
        assert!(create_info.p_depth_stencil_state.is_null());
        assert!(create_info.p_next.is_null());
    }

    #[test]
    fn overriding_one_slot_leaves_the_others() {
        let (fixture, _device) = fixture!();
        let defaults = GraphicsPipelineHelper::new(&fixture).unwrap();

        let slots = |helper: &GraphicsPipelineHelper<'_>| {
            [
                format!("{:?}", helper.vertex_input_state),
                format!("{:?}", helper.input_assembly_state),
                format!("{:?}", helper.tessellation_state),
                format!("{:?}", helper.viewport_state),
                format!("{:?}", helper.rasterization_state),
                format!("{:?}", helper.multisample_state),
                format!("{:?}", helper.depth_stencil_state),
                format!("{:?}", helper.color_blend_state),
                format!("{:?}", helper.dynamic_state),
                format!("{:?}", helper.layout),
            ]
        };

        let overrides: [fn(&mut GraphicsPipelineHelper<'_>); 10] = [
            |h| h.vertex_input_state = None,
            |h| {
                h.input_assembly_state.as_mut().unwrap().topology =
                    vk::PrimitiveTopology::POINT_LIST
            },
            |h| h.tessellation_state = Some(Default::default()),
            |h| h.viewport_state.as_mut().unwrap().scissors.clear(),
            |h| h.rasterization_state.as_mut().unwrap().line_width = 2.0,
            |h| {
                h.multisample_state.as_mut().unwrap().rasterization_samples =
                    vk::SampleCountFlags::TYPE_4
            },
            |h| h.depth_stencil_state = Some(Default::default()),
            |h| h.color_blend_state = Some(ColorBlendState::new(3)),
            |h| h.add_dynamic_state(vk::DynamicState::SCISSOR),
            |h| h.layout.bindings.clear(),
        ];

        for (index, apply) in overrides.into_iter().enumerate() {
            let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
            apply(&mut helper);

            let changed: Vec<usize> = slots(&helper)
                .iter()
                .zip(slots(&defaults).iter())
                .enumerate()
                .filter(|(_, (slot, default))| slot != default)
                .map(|(slot_index, _)| slot_index)
                .collect();
            assert_eq!(changed, [index]);
        }
    }

    #[test]
    fn stale_binding_observes_old_stages() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();

        helper.late_bind_pipeline_info().unwrap();
        helper
            .shader_stages
            .retain(|stage| stage.stage == vk::ShaderStageFlags::FRAGMENT);

        // The vertex module is only kept alive by the binding now.
        assert_eq!(
            helper.create_graphics_pipeline(false, false),
            vk::Result::SUCCESS,
        );
        let stages: Vec<_> = device
            .observed()
            .stages
            .iter()
            .map(|stage| stage.stage)
            .collect();
        assert_eq!(
            stages,
            [vk::ShaderStageFlags::VERTEX, vk::ShaderStageFlags::FRAGMENT],
        );

        fixture.monitor().set_desired_error(MISSING_VERTEX_STAGE);
        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::ERROR_VALIDATION_FAILED_EXT,
        );
        fixture.monitor().verify_found();
        assert_eq!(device.observed().stages.len(), 1);
        assert_eq!(helper.handle(), vk::Pipeline::null());
    }

    #[test]
    fn fail_then_fix() {
        let (fixture, _device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.rasterization_state.as_mut().unwrap().line_width = 2.0;

        fixture.monitor().set_desired_error(LINE_WIDTH);
        assert_ne!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        fixture.monitor().verify_found();

        helper.add_dynamic_state(vk::DynamicState::LINE_WIDTH);
        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
    }

    #[test]
    fn duplicate_dynamic_state() {
        let (fixture, _device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.add_dynamic_state(vk::DynamicState::VIEWPORT);
        helper.add_dynamic_state(vk::DynamicState::VIEWPORT);
        assert_eq!(
            helper.dynamic_state,
            Some(DynamicState {
                states: vec![vk::DynamicState::VIEWPORT; 2],
                count: None,
            }),
        );

        fixture.monitor().set_desired_error(DUPLICATE_DYNAMIC_STATE);
        helper.create_graphics_pipeline(true, false);
        fixture.monitor().verify_found();
    }

    #[test]
    fn cached_and_uncached() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();

        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        let first = helper.handle();
        assert_ne!(device.observed().pipeline_cache, vk::PipelineCache::null());
        let live = device.live_handles();

        assert_eq!(
            helper.create_graphics_pipeline(true, true),
            vk::Result::SUCCESS,
        );
        assert_ne!(helper.handle(), first);
        assert_eq!(device.observed().pipeline_cache, vk::PipelineCache::null());
        assert_eq!(device.observed().graphics_pipeline_calls, 2);
        // The first pipeline was replaced.
        assert_eq!(device.live_handles(), live);
    }

    #[test]
    fn injected_failure_clears_the_pipeline() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );

        device.queue_result(
            "vkCreateGraphicsPipelines",
            vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        );
        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::ERROR_OUT_OF_HOST_MEMORY,
        );
        assert!(helper.pipeline().is_none());
    }

    #[test]
    fn vertex_shader_only() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper
            .shader_stages
            .retain(|stage| stage.stage == vk::ShaderStageFlags::FRAGMENT);
        helper.vertex_shader_only();

        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        let stages = device.observed().stages;
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].stage, vk::ShaderStageFlags::VERTEX);
        assert!(helper.rasterization_state.unwrap().rasterizer_discard_enable);
    }

    #[test]
    fn reset_shader_info_compile_failure() {
        let (fixture, _device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();

        fixture.monitor().set_desired_error(COMPILE_FAILURE_ID);
        let result = helper.reset_shader_info(
            &ShaderSource::glsl("#version 450\nvoid main() {}"),
            fixture.fragment_source(),
        );
        assert!(result.is_err());
        fixture.monitor().verify_found();
        assert_eq!(helper.shader_stages.len(), 2);

        helper
            .reset_shader_info(fixture.vertex_source(), fixture.fragment_source())
            .unwrap();
        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
    }

    #[test]
    fn layout_follows_its_descriptor() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.late_bind_pipeline_info().unwrap();
        let first = helper.pipeline_layout_handle();

        helper.late_bind_pipeline_info().unwrap();
        assert_eq!(helper.pipeline_layout_handle(), first);

        helper.layout.push_constant_ranges.push(PushConstantRange {
            stages: vk::ShaderStageFlags::VERTEX,
            offset: 0,
            size: 4,
        });
        helper.create_graphics_pipeline(true, false);
        assert_ne!(helper.pipeline_layout_handle(), first);
        assert_eq!(device.observed().layout, helper.pipeline_layout_handle());
    }

    #[test]
    fn external_pipeline_layout() {
        let (fixture, device) = fixture!();
        let layout = Arc::new(
            PipelineLayout::new(fixture.device().clone(), &Default::default()).unwrap(),
        );

        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.pipeline_layout = Some(layout.clone());
        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        assert_eq!(device.observed().layout, layout.handle());
    }

    #[test]
    fn blend_attachment_count_mismatch() {
        let (fixture, _device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.color_blend_state = Some(ColorBlendState::new(2));

        fixture.monitor().set_desired_error(BLEND_ATTACHMENT_COUNT);
        helper.create_graphics_pipeline(true, false);
        fixture.monitor().verify_found();
    }

    #[test]
    fn dynamic_rendering() {
        let (fixture, _device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.render_pass = vk::RenderPass::null();
        helper.rendering = Some(RenderingState {
            color_attachment_formats: vec![vk::Format::R8G8B8A8_UNORM],
            ..Default::default()
        });

        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        let create_info = helper.bound_create_info().unwrap();
        assert!(!create_info.p_next.is_null());
        assert_eq!(create_info.render_pass, vk::RenderPass::null());
    }

    #[test]
    fn vertex_input_library_binds_its_slots() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.init_vertex_input_lib_info();

        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );

        let create_info = helper.bound_create_info().unwrap();
        assert!(create_info
            .flags
            .contains(vk::PipelineCreateFlags::LIBRARY_KHR));
        assert!(!create_info.p_vertex_input_state.is_null());
        assert!(!create_info.p_input_assembly_state.is_null());
        assert!(create_info.p_rasterization_state.is_null());
        assert!(create_info.p_color_blend_state.is_null());
        assert_eq!(create_info.stage_count, 0);
        assert_eq!(create_info.layout, vk::PipelineLayout::null());
        assert_eq!(create_info.render_pass, vk::RenderPass::null());

        assert_eq!(
            device.library_flags(helper.handle()),
            Some(vk::GraphicsPipelineLibraryFlagsEXT::VERTEX_INPUT_INTERFACE),
        );
    }

    #[test]
    fn shaderless_library_takes_an_explicit_layout() {
        let (fixture, device) = fixture!();
        let layout = Arc::new(
            PipelineLayout::new(fixture.device().clone(), &Default::default()).unwrap(),
        );

        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.init_fragment_output_lib_info();
        helper.pipeline_layout = Some(layout.clone());

        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        assert_eq!(device.observed().layout, layout.handle());

        helper.pipeline_layout = None;
        helper.create_graphics_pipeline(true, false);
        assert_eq!(device.observed().layout, vk::PipelineLayout::null());
    }

    #[test]
    fn viewport_count_override() {
        let (fixture, _device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        let viewport_state = helper.viewport_state.as_mut().unwrap();
        viewport_state.viewport_count = Some(2);
        viewport_state.scissors.clear();
        viewport_state.scissor_count = Some(1);

        helper.late_bind_pipeline_info().unwrap();
        let bound = unsafe { &*helper.bound_create_info().unwrap().p_viewport_state };
        assert_eq!(bound.viewport_count, 2);
        assert!(!bound.p_viewports.is_null());
        assert_eq!(bound.scissor_count, 1);
        assert!(bound.p_scissors.is_null());

        // The padding is zeroed and the helper's own records are left alone.
        let viewports = unsafe { std::slice::from_raw_parts(bound.p_viewports, 2) };
        assert_eq!(viewports[0].width, 64.0);
        assert_eq!(viewports[1].width, 0.0);
        assert_eq!(helper.viewport_state.as_ref().unwrap().viewports.len(), 1);
    }

    #[test]
    fn dynamic_state_count_override() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.add_dynamic_state(vk::DynamicState::VIEWPORT);
        helper.dynamic_state.as_mut().unwrap().count = Some(0);

        // A count of 0 hides the listed state from the implementation.
        assert_eq!(
            helper.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        assert!(device.observed().dynamic_states.is_empty());
        assert_eq!(device.observed().dynamic_state_count, 0);

        helper.dynamic_state.as_mut().unwrap().count = None;
        helper.create_graphics_pipeline(true, false);
        assert_eq!(device.observed().dynamic_state_count, 1);
    }

    #[test]
    fn corrupted_stage_count() {
        let (fixture, device) = fixture!();
        let mut helper = GraphicsPipelineHelper::new(&fixture).unwrap();
        helper.shader_stages.reverse();
        helper.late_bind_pipeline_info().unwrap();

        // Only the fragment stage is left in view of the implementation.
        unsafe { helper.bound_create_info_mut().unwrap().stage_count = 1 };

        fixture.monitor().set_desired_error(MISSING_VERTEX_STAGE);
        helper.create_graphics_pipeline(false, false);
        fixture.monitor().verify_found();
        assert_eq!(
            device.observed().stages[0].stage,
            vk::ShaderStageFlags::FRAGMENT,
        );
    }
}
