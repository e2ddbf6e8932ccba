// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The fixed-function state of a graphics pipeline, one record per slot.
//!
//! Every record's `Default` value is a minimal legal configuration, so a helper that overrides
//! nothing describes a pipeline that can be created. The records only hold values; pointers and
//! counts are produced when the helper late-binds its create info.
//!
//! # Count overrides
//!
//! A count is normally the length of its array. The records whose counts tests commonly get
//! wrong on purpose have an `Option<u32>` override for each such count, which is passed instead
//! when set. An empty array is passed as null whatever its count. A non-empty array shorter than
//! its count is padded with zeroed elements when bound, so that the implementation never reads
//! past the end of it.

use ash::vk;
use std::ops::RangeInclusive;

/// How vertices are fetched from vertex buffers.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VertexInputState {
    /// The default value is empty.
    pub bindings: Vec<VertexInputBinding>,

    /// The default value is empty.
    pub attributes: Vec<VertexInputAttribute>,

    /// Passed as `vertexBindingDescriptionCount` instead of the length of `bindings`.
    ///
    /// The default value is `None`.
    pub binding_count: Option<u32>,

    /// Passed as `vertexAttributeDescriptionCount` instead of the length of `attributes`.
    ///
    /// The default value is `None`.
    pub attribute_count: Option<u32>,
}

/// Describes one vertex buffer binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexInputBinding {
    pub binding: u32,
    pub stride: u32,
    pub input_rate: vk::VertexInputRate,
}

impl VertexInputBinding {
    #[inline]
    pub(crate) fn to_vk(self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: self.binding,
            stride: self.stride,
            input_rate: self.input_rate,
        }
    }
}

/// Describes one vertex attribute.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexInputAttribute {
    pub location: u32,
    pub binding: u32,
    pub format: vk::Format,
    pub offset: u32,
}

impl VertexInputAttribute {
    #[inline]
    pub(crate) fn to_vk(self) -> vk::VertexInputAttributeDescription {
        vk::VertexInputAttributeDescription {
            location: self.location,
            binding: self.binding,
            format: self.format,
            offset: self.offset,
        }
    }
}

/// How vertices are assembled into primitives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InputAssemblyState {
    /// The default value is `TRIANGLE_STRIP`.
    pub topology: vk::PrimitiveTopology,

    /// The default value is `false`.
    pub primitive_restart_enable: bool,
}

impl Default for InputAssemblyState {
    #[inline]
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_STRIP,
            primitive_restart_enable: false,
        }
    }
}

impl InputAssemblyState {
    pub(crate) fn to_vk(self) -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
        vk::PipelineInputAssemblyStateCreateInfo {
            topology: self.topology,
            primitive_restart_enable: self.primitive_restart_enable.into(),
            ..Default::default()
        }
    }
}

/// Tessellation state. Ignored unless the pipeline has tessellation shaders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TessellationState {
    /// The default value is 1.
    pub patch_control_points: u32,
}

impl Default for TessellationState {
    #[inline]
    fn default() -> Self {
        Self {
            patch_control_points: 1,
        }
    }
}

impl TessellationState {
    pub(crate) fn to_vk(self) -> vk::PipelineTessellationStateCreateInfo<'static> {
        vk::PipelineTessellationStateCreateInfo {
            patch_control_points: self.patch_control_points,
            ..Default::default()
        }
    }
}

/// A viewport transformation.
#[derive(Clone, Debug, PartialEq)]
pub struct Viewport {
    /// Coordinates in pixels of the top-left hand corner of the viewport.
    pub offset: [f32; 2],

    /// Dimensions in pixels of the viewport.
    pub extent: [f32; 2],

    /// Minimum and maximum values of the depth.
    pub depth_range: RangeInclusive<f32>,
}

impl Viewport {
    #[inline]
    pub(crate) fn to_vk(&self) -> vk::Viewport {
        vk::Viewport {
            x: self.offset[0],
            y: self.offset[1],
            width: self.extent[0],
            height: self.extent[1],
            min_depth: *self.depth_range.start(),
            max_depth: *self.depth_range.end(),
        }
    }
}

/// A scissor rectangle. The offset is signed so that negative offsets can be expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scissor {
    pub offset: [i32; 2],
    pub extent: [u32; 2],
}

impl Scissor {
    #[inline]
    pub(crate) fn to_vk(self) -> vk::Rect2D {
        vk::Rect2D {
            offset: vk::Offset2D {
                x: self.offset[0],
                y: self.offset[1],
            },
            extent: vk::Extent2D {
                width: self.extent[0],
                height: self.extent[1],
            },
        }
    }
}

/// Viewports and scissors.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewportState {
    /// The default value is a single 64x64 viewport with a depth range of `0.0..=1.0`.
    pub viewports: Vec<Viewport>,

    /// The default value is a single 64x64 scissor.
    pub scissors: Vec<Scissor>,

    /// Passed as `viewportCount` instead of the length of `viewports`.
    ///
    /// The default value is `None`.
    pub viewport_count: Option<u32>,

    /// Passed as `scissorCount` instead of the length of `scissors`.
    ///
    /// The default value is `None`.
    pub scissor_count: Option<u32>,
}

impl Default for ViewportState {
    #[inline]
    fn default() -> Self {
        Self {
            viewports: vec![Viewport {
                offset: [0.0, 0.0],
                extent: [64.0, 64.0],
                depth_range: 0.0..=1.0,
            }],
            scissors: vec![Scissor {
                offset: [0, 0],
                extent: [64, 64],
            }],
            viewport_count: None,
            scissor_count: None,
        }
    }
}

/// How primitives are turned into fragments.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RasterizationState {
    /// The default value is `false`.
    pub depth_clamp_enable: bool,

    /// The default value is `false`.
    pub rasterizer_discard_enable: bool,

    /// The default value is `FILL`.
    pub polygon_mode: vk::PolygonMode,

    /// The default value is `BACK`.
    pub cull_mode: vk::CullModeFlags,

    /// The default value is `COUNTER_CLOCKWISE`.
    pub front_face: vk::FrontFace,

    /// The default value is `false`, with all factors zero.
    pub depth_bias_enable: bool,
    pub depth_bias_constant_factor: f32,
    pub depth_bias_clamp: f32,
    pub depth_bias_slope_factor: f32,

    /// The default value is 1.0.
    pub line_width: f32,
}

impl Default for RasterizationState {
    #[inline]
    fn default() -> Self {
        Self {
            depth_clamp_enable: false,
            rasterizer_discard_enable: false,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::BACK,
            front_face: vk::FrontFace::COUNTER_CLOCKWISE,
            depth_bias_enable: false,
            depth_bias_constant_factor: 0.0,
            depth_bias_clamp: 0.0,
            depth_bias_slope_factor: 0.0,
            line_width: 1.0,
        }
    }
}

impl RasterizationState {
    pub(crate) fn to_vk(self) -> vk::PipelineRasterizationStateCreateInfo<'static> {
        vk::PipelineRasterizationStateCreateInfo {
            depth_clamp_enable: self.depth_clamp_enable.into(),
            rasterizer_discard_enable: self.rasterizer_discard_enable.into(),
            polygon_mode: self.polygon_mode,
            cull_mode: self.cull_mode,
            front_face: self.front_face,
            depth_bias_enable: self.depth_bias_enable.into(),
            depth_bias_constant_factor: self.depth_bias_constant_factor,
            depth_bias_clamp: self.depth_bias_clamp,
            depth_bias_slope_factor: self.depth_bias_slope_factor,
            line_width: self.line_width,
            ..Default::default()
        }
    }
}

/// Multisampling.
#[derive(Clone, Debug, PartialEq)]
pub struct MultisampleState {
    /// The default value is `TYPE_1`.
    pub rasterization_samples: vk::SampleCountFlags,

    /// The default value is `false`, with a minimum of 1.0.
    pub sample_shading_enable: bool,
    pub min_sample_shading: f32,

    /// An empty mask is passed as a null pointer. The default value is empty.
    pub sample_mask: Vec<u32>,

    /// The default value is `false`.
    pub alpha_to_coverage_enable: bool,

    /// The default value is `false`.
    pub alpha_to_one_enable: bool,
}

impl Default for MultisampleState {
    #[inline]
    fn default() -> Self {
        Self {
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            sample_shading_enable: false,
            min_sample_shading: 1.0,
            sample_mask: Vec::new(),
            alpha_to_coverage_enable: false,
            alpha_to_one_enable: false,
        }
    }
}

impl MultisampleState {
    pub(crate) fn to_vk(&self) -> vk::PipelineMultisampleStateCreateInfo<'static> {
        vk::PipelineMultisampleStateCreateInfo {
            rasterization_samples: self.rasterization_samples,
            sample_shading_enable: self.sample_shading_enable.into(),
            min_sample_shading: self.min_sample_shading,
            alpha_to_coverage_enable: self.alpha_to_coverage_enable.into(),
            alpha_to_one_enable: self.alpha_to_one_enable.into(),
            ..Default::default()
        }
    }
}

/// Stencil operations for one face.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StencilOpState {
    pub fail_op: vk::StencilOp,
    pub pass_op: vk::StencilOp,
    pub depth_fail_op: vk::StencilOp,
    pub compare_op: vk::CompareOp,
    pub compare_mask: u32,
    pub write_mask: u32,
    pub reference: u32,
}

impl Default for StencilOpState {
    #[inline]
    fn default() -> Self {
        Self {
            fail_op: vk::StencilOp::KEEP,
            pass_op: vk::StencilOp::KEEP,
            depth_fail_op: vk::StencilOp::KEEP,
            compare_op: vk::CompareOp::NEVER,
            compare_mask: u32::MAX,
            write_mask: u32::MAX,
            reference: u32::MAX,
        }
    }
}

impl StencilOpState {
    #[inline]
    fn to_vk(self) -> vk::StencilOpState {
        vk::StencilOpState {
            fail_op: self.fail_op,
            pass_op: self.pass_op,
            depth_fail_op: self.depth_fail_op,
            compare_op: self.compare_op,
            compare_mask: self.compare_mask,
            write_mask: self.write_mask,
            reference: self.reference,
        }
    }
}

/// Depth and stencil tests. The default value has every test disabled.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,

    /// The default value is `LESS`.
    pub depth_compare_op: vk::CompareOp,

    pub depth_bounds_test_enable: bool,

    /// The default value is `0.0..=1.0`.
    pub depth_bounds: RangeInclusive<f32>,

    pub stencil_test_enable: bool,
    pub front: StencilOpState,
    pub back: StencilOpState,
}

impl Default for DepthStencilState {
    #[inline]
    fn default() -> Self {
        Self {
            depth_test_enable: false,
            depth_write_enable: false,
            depth_compare_op: vk::CompareOp::LESS,
            depth_bounds_test_enable: false,
            depth_bounds: 0.0..=1.0,
            stencil_test_enable: false,
            front: StencilOpState::default(),
            back: StencilOpState::default(),
        }
    }
}

impl DepthStencilState {
    pub(crate) fn to_vk(&self) -> vk::PipelineDepthStencilStateCreateInfo<'static> {
        vk::PipelineDepthStencilStateCreateInfo {
            depth_test_enable: self.depth_test_enable.into(),
            depth_write_enable: self.depth_write_enable.into(),
            depth_compare_op: self.depth_compare_op,
            depth_bounds_test_enable: self.depth_bounds_test_enable.into(),
            stencil_test_enable: self.stencil_test_enable.into(),
            front: self.front.to_vk(),
            back: self.back.to_vk(),
            min_depth_bounds: *self.depth_bounds.start(),
            max_depth_bounds: *self.depth_bounds.end(),
            ..Default::default()
        }
    }
}

/// Blending of one color attachment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorBlendAttachmentState {
    pub blend_enable: bool,
    pub src_color_blend_factor: vk::BlendFactor,
    pub dst_color_blend_factor: vk::BlendFactor,
    pub color_blend_op: vk::BlendOp,
    pub src_alpha_blend_factor: vk::BlendFactor,
    pub dst_alpha_blend_factor: vk::BlendFactor,
    pub alpha_blend_op: vk::BlendOp,
    pub color_write_mask: vk::ColorComponentFlags,
}

impl Default for ColorBlendAttachmentState {
    #[inline]
    fn default() -> Self {
        default_color_blend_attachment_state()
    }
}

impl ColorBlendAttachmentState {
    #[inline]
    pub(crate) fn to_vk(self) -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState {
            blend_enable: self.blend_enable.into(),
            src_color_blend_factor: self.src_color_blend_factor,
            dst_color_blend_factor: self.dst_color_blend_factor,
            color_blend_op: self.color_blend_op,
            src_alpha_blend_factor: self.src_alpha_blend_factor,
            dst_alpha_blend_factor: self.dst_alpha_blend_factor,
            alpha_blend_op: self.alpha_blend_op,
            color_write_mask: self.color_write_mask,
        }
    }
}

/// Returns an attachment state with blending disabled that writes all four components.
#[inline]
pub fn default_color_blend_attachment_state() -> ColorBlendAttachmentState {
    ColorBlendAttachmentState {
        blend_enable: false,
        src_color_blend_factor: vk::BlendFactor::ZERO,
        dst_color_blend_factor: vk::BlendFactor::ZERO,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ZERO,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
        color_write_mask: vk::ColorComponentFlags::RGBA,
    }
}

/// How fragment outputs are combined with the color attachments.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorBlendState {
    /// The default value is `false`, with `COPY` as the operation.
    pub logic_op_enable: bool,
    pub logic_op: vk::LogicOp,

    /// One entry per color attachment of the subpass. The default value is a single
    /// [`default_color_blend_attachment_state`].
    pub attachments: Vec<ColorBlendAttachmentState>,

    /// The default value is all zeros.
    pub blend_constants: [f32; 4],
}

impl Default for ColorBlendState {
    #[inline]
    fn default() -> Self {
        Self::new(1)
    }
}

impl ColorBlendState {
    /// Returns a `ColorBlendState` with `num` default attachment states.
    #[inline]
    pub fn new(num: u32) -> Self {
        Self {
            logic_op_enable: false,
            logic_op: vk::LogicOp::COPY,
            attachments: (0..num)
                .map(|_| default_color_blend_attachment_state())
                .collect(),
            blend_constants: [0.0; 4],
        }
    }

    pub(crate) fn to_vk(&self) -> vk::PipelineColorBlendStateCreateInfo<'static> {
        vk::PipelineColorBlendStateCreateInfo {
            logic_op_enable: self.logic_op_enable.into(),
            logic_op: self.logic_op,
            blend_constants: self.blend_constants,
            ..Default::default()
        }
    }
}

/// The states that are set by commands instead of being baked into the pipeline.
///
/// The list is passed as is: duplicates and out-of-range values reach the implementation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DynamicState {
    /// The default value is empty.
    pub states: Vec<vk::DynamicState>,

    /// Passed as `dynamicStateCount` instead of the length of `states`.
    ///
    /// The default value is `None`.
    pub count: Option<u32>,
}

/// One binding of a descriptor set layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DescriptorBinding {
    pub binding: u32,
    pub descriptor_type: vk::DescriptorType,
    pub descriptor_count: u32,
    pub stages: vk::ShaderStageFlags,
}

impl DescriptorBinding {
    /// Returns a binding of one descriptor.
    #[inline]
    pub fn new(
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
    ) -> Self {
        Self {
            binding,
            descriptor_type,
            descriptor_count: 1,
            stages,
        }
    }

    #[inline]
    pub(crate) fn to_vk(self) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding {
            binding: self.binding,
            descriptor_type: self.descriptor_type,
            descriptor_count: self.descriptor_count,
            stage_flags: self.stages,
            ..Default::default()
        }
    }
}

/// A range of push constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushConstantRange {
    pub stages: vk::ShaderStageFlags,
    pub offset: u32,
    pub size: u32,
}

impl PushConstantRange {
    #[inline]
    pub(crate) fn to_vk(self) -> vk::PushConstantRange {
        vk::PushConstantRange {
            stage_flags: self.stages,
            offset: self.offset,
            size: self.size,
        }
    }
}

/// What the pipeline layout of a helper is built from: a single descriptor set layout and the
/// push constant ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LayoutDescriptor {
    /// The default value is empty.
    pub flags: vk::PipelineLayoutCreateFlags,

    /// The default value is empty.
    pub set_layout_flags: vk::DescriptorSetLayoutCreateFlags,

    /// The bindings of the single descriptor set layout.
    pub bindings: Vec<DescriptorBinding>,

    /// The default value is empty.
    pub push_constant_ranges: Vec<PushConstantRange>,
}

impl LayoutDescriptor {
    /// Returns a `LayoutDescriptor` with the given bindings and nothing else.
    #[inline]
    pub fn bindings(bindings: impl IntoIterator<Item = DescriptorBinding>) -> Self {
        Self {
            bindings: bindings.into_iter().collect(),
            ..Default::default()
        }
    }
}

/// Attachment formats for rendering without a render pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderingState {
    pub view_mask: u32,
    pub color_attachment_formats: Vec<vk::Format>,
    pub depth_attachment_format: vk::Format,
    pub stencil_attachment_format: vk::Format,
}

impl RenderingState {
    pub(crate) fn to_vk(&self) -> vk::PipelineRenderingCreateInfo<'static> {
        vk::PipelineRenderingCreateInfo {
            view_mask: self.view_mask,
            depth_attachment_format: self.depth_attachment_format,
            stencil_attachment_format: self.stencil_attachment_format,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ColorBlendState, DepthStencilState, MultisampleState, RasterizationState, ViewportState,
    };
    use ash::vk;

    #[test]
    fn defaults_are_minimal() {
        let viewport = ViewportState::default();
        assert_eq!(viewport.viewports.len(), viewport.scissors.len());

        let blend = ColorBlendState::default();
        assert_eq!(blend.attachments.len(), 1);
        assert_eq!(
            blend.attachments[0].color_write_mask,
            vk::ColorComponentFlags::RGBA,
        );

        let multisample = MultisampleState::default().to_vk();
        assert_eq!(multisample.rasterization_samples, vk::SampleCountFlags::TYPE_1);
        assert!(multisample.p_sample_mask.is_null());

        let rasterization = RasterizationState::default().to_vk();
        assert_eq!(rasterization.line_width, 1.0);
        assert_eq!(rasterization.rasterizer_discard_enable, vk::FALSE);

        let depth_stencil = DepthStencilState::default().to_vk();
        assert_eq!(depth_stencil.depth_test_enable, vk::FALSE);
        assert_eq!(depth_stencil.max_depth_bounds, 1.0);
    }
}
