// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Composing graphics pipeline libraries into one pipeline.
//!
//! With `VK_EXT_graphics_pipeline_library` a graphics pipeline can be built from up to four
//! independently created libraries, one per [`LibraryKind`]. Each library is described by a
//! [`GraphicsPipelineHelper`] switched into library mode with its `init_*_lib_info` method.
//! [`link_libraries`] links the created libraries in a fixed order, and [`SimpleGpl`] does the
//! whole sequence for the common case.

use crate::{
    fixture::TestFixture,
    pipeline::{
        graphics::{state::LayoutDescriptor, GraphicsPipelineHelper},
        layout::PipelineLayout,
        Pipeline,
    },
    shader::ShaderSource,
    HarnessError,
};
use ash::vk;
use smallvec::SmallVec;
use std::{fmt, sync::Arc};

/// The four kinds of graphics pipeline library, in link order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LibraryKind {
    VertexInput,
    PreRasterization,
    FragmentShader,
    FragmentOutput,
}

impl LibraryKind {
    /// Every kind, in the order libraries are linked.
    pub const ALL: [LibraryKind; 4] = [
        LibraryKind::VertexInput,
        LibraryKind::PreRasterization,
        LibraryKind::FragmentShader,
        LibraryKind::FragmentOutput,
    ];

    /// Returns the library part the kind stands for.
    #[inline]
    pub fn flags(self) -> vk::GraphicsPipelineLibraryFlagsEXT {
        match self {
            LibraryKind::VertexInput => vk::GraphicsPipelineLibraryFlagsEXT::VERTEX_INPUT_INTERFACE,
            LibraryKind::PreRasterization => {
                vk::GraphicsPipelineLibraryFlagsEXT::PRE_RASTERIZATION_SHADERS
            }
            LibraryKind::FragmentShader => vk::GraphicsPipelineLibraryFlagsEXT::FRAGMENT_SHADER,
            LibraryKind::FragmentOutput => {
                vk::GraphicsPipelineLibraryFlagsEXT::FRAGMENT_OUTPUT_INTERFACE
            }
        }
    }
}

impl fmt::Display for LibraryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LibraryKind::VertexInput => "vertex input interface",
            LibraryKind::PreRasterization => "pre-rasterization shaders",
            LibraryKind::FragmentShader => "fragment shader",
            LibraryKind::FragmentOutput => "fragment output interface",
        })
    }
}

/// Up to four library helpers to link. Absent kinds are left out of the link.
#[derive(Clone, Copy, Debug, Default)]
pub struct PipelineLibraries<'h> {
    pub vertex_input: Option<&'h GraphicsPipelineHelper<'h>>,
    pub pre_rasterization: Option<&'h GraphicsPipelineHelper<'h>>,
    pub fragment_shader: Option<&'h GraphicsPipelineHelper<'h>>,
    pub fragment_output: Option<&'h GraphicsPipelineHelper<'h>>,
}

impl<'h> PipelineLibraries<'h> {
    /// Returns a set with all four kinds present.
    #[inline]
    pub fn all(
        vertex_input: &'h GraphicsPipelineHelper<'h>,
        pre_rasterization: &'h GraphicsPipelineHelper<'h>,
        fragment_shader: &'h GraphicsPipelineHelper<'h>,
        fragment_output: &'h GraphicsPipelineHelper<'h>,
    ) -> Self {
        PipelineLibraries {
            vertex_input: Some(vertex_input),
            pre_rasterization: Some(pre_rasterization),
            fragment_shader: Some(fragment_shader),
            fragment_output: Some(fragment_output),
        }
    }

    #[inline]
    pub fn get(&self, kind: LibraryKind) -> Option<&'h GraphicsPipelineHelper<'h>> {
        match kind {
            LibraryKind::VertexInput => self.vertex_input,
            LibraryKind::PreRasterization => self.pre_rasterization,
            LibraryKind::FragmentShader => self.fragment_shader,
            LibraryKind::FragmentOutput => self.fragment_output,
        }
    }

    /// Returns the present libraries in link order.
    pub fn iter(&self) -> impl Iterator<Item = (LibraryKind, &'h GraphicsPipelineHelper<'h>)> + '_ {
        LibraryKind::ALL
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|helper| (kind, helper)))
    }
}

/// Links the present libraries into one pipeline, in [`LibraryKind::ALL`] order.
///
/// Fails without linking if a present library has no pipeline. The link itself is attempted
/// once; its diagnostics go to the monitor like those of any other creation.
pub fn link_libraries(
    fixture: &TestFixture,
    layout: vk::PipelineLayout,
    libraries: &PipelineLibraries<'_>,
) -> Result<Pipeline, HarnessError> {
    let mut handles: SmallVec<[vk::Pipeline; 4]> = SmallVec::new();

    for (kind, helper) in libraries.iter() {
        let handle = helper.handle();

        if handle == vk::Pipeline::null() {
            return Err(HarnessError::LibraryNotCreated { kind });
        }

        handles.push(handle);
    }

    let mut link_info = vk::PipelineLibraryCreateInfoKHR::default().libraries(&handles);
    let create_info = vk::GraphicsPipelineCreateInfo::default()
        .layout(layout)
        .base_pipeline_index(-1)
        .push_next(&mut link_info);

    let device = fixture.device();
    let handle = unsafe { device.create_graphics_pipeline(vk::PipelineCache::null(), &create_info) }
        .map_err(HarnessError::Vulkan)?;
    log::debug!("linked {} libraries into {:?}", handles.len(), handle);

    Ok(unsafe { Pipeline::from_handle(device.clone(), handle, vk::PipelineBindPoint::GRAPHICS) })
}

/// A pipeline built from all four kinds of library, with inline shader code.
///
/// Owns the linked pipeline, the four library helpers and the shared layout. The linked
/// pipeline is destroyed first.
#[derive(Debug)]
pub struct SimpleGpl<'a> {
    pipeline: Pipeline,
    vertex_input: GraphicsPipelineHelper<'a>,
    pre_rasterization: GraphicsPipelineHelper<'a>,
    fragment_shader: GraphicsPipelineHelper<'a>,
    fragment_output: GraphicsPipelineHelper<'a>,
    layout: Arc<PipelineLayout>,
}

impl<'a> SimpleGpl<'a> {
    /// Creates the four libraries and links them.
    ///
    /// - `layout` is shared by the shader libraries and the link. If `None`, a layout with the
    ///   fixture's graphics bindings is created.
    /// - `vertex_source` and `fragment_source` default to the fixture's shaders.
    ///
    /// The first library that fails to be created is reported as
    /// [`HarnessError::LibraryCreation`], and nothing is linked.
    pub fn new(
        fixture: &'a TestFixture,
        layout: Option<Arc<PipelineLayout>>,
        vertex_source: Option<&ShaderSource>,
        fragment_source: Option<&ShaderSource>,
    ) -> Result<Self, HarnessError> {
        let layout = match layout {
            Some(layout) => layout,
            None => Arc::new(PipelineLayout::new(
                fixture.device().clone(),
                &LayoutDescriptor::bindings(fixture.graphics_bindings().iter().copied()),
            )?),
        };

        let vertex_stage = fixture.create_inline_shader_stage(
            vertex_source.unwrap_or(fixture.vertex_source()),
            vk::ShaderStageFlags::VERTEX,
        )?;
        let fragment_stage = fixture.create_inline_shader_stage(
            fragment_source.unwrap_or(fixture.fragment_source()),
            vk::ShaderStageFlags::FRAGMENT,
        )?;

        let mut vertex_input = GraphicsPipelineHelper::new(fixture)?;
        vertex_input.init_vertex_input_lib_info();
        create_library(&mut vertex_input, LibraryKind::VertexInput)?;

        let mut pre_rasterization = GraphicsPipelineHelper::new(fixture)?;
        pre_rasterization.init_pre_raster_lib_info([vertex_stage]);
        pre_rasterization.pipeline_layout = Some(layout.clone());
        create_library(&mut pre_rasterization, LibraryKind::PreRasterization)?;

        let mut fragment_shader = GraphicsPipelineHelper::new(fixture)?;
        fragment_shader.init_fragment_lib_info([fragment_stage]);
        fragment_shader.pipeline_layout = Some(layout.clone());
        create_library(&mut fragment_shader, LibraryKind::FragmentShader)?;

        let mut fragment_output = GraphicsPipelineHelper::new(fixture)?;
        fragment_output.init_fragment_output_lib_info();
        create_library(&mut fragment_output, LibraryKind::FragmentOutput)?;

        let pipeline = link_libraries(
            fixture,
            layout.handle(),
            &PipelineLibraries::all(
                &vertex_input,
                &pre_rasterization,
                &fragment_shader,
                &fragment_output,
            ),
        )?;

        Ok(SimpleGpl {
            pipeline,
            vertex_input,
            pre_rasterization,
            fragment_shader,
            fragment_output,
            layout,
        })
    }

    /// Returns the linked pipeline.
    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline.handle()
    }

    #[inline]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> &Arc<PipelineLayout> {
        &self.layout
    }

    /// Returns the helper of one of the libraries.
    #[inline]
    pub fn library(&self, kind: LibraryKind) -> &GraphicsPipelineHelper<'a> {
        match kind {
            LibraryKind::VertexInput => &self.vertex_input,
            LibraryKind::PreRasterization => &self.pre_rasterization,
            LibraryKind::FragmentShader => &self.fragment_shader,
            LibraryKind::FragmentOutput => &self.fragment_output,
        }
    }
}

fn create_library(
    helper: &mut GraphicsPipelineHelper<'_>,
    kind: LibraryKind,
) -> Result<(), HarnessError> {
    match helper.create_graphics_pipeline(true, false) {
        vk::Result::SUCCESS => Ok(()),
        result => Err(HarnessError::LibraryCreation { kind, result }),
    }
}

#[cfg(test)]
mod tests {
    use super::{link_libraries, LibraryKind, PipelineLibraries, SimpleGpl};
    use crate::{
        pipeline::graphics::GraphicsPipelineHelper, tests::INCOMPLETE_LINK, HarnessError,
    };
    use ash::vk::{self, Handle};

    #[test]
    fn link_four_libraries() {
        let (fixture, device) = fixture!();
        let pre_raster_stage = fixture
            .create_inline_shader_stage(fixture.vertex_source(), vk::ShaderStageFlags::VERTEX)
            .unwrap();
        let fragment_stage = fixture
            .create_inline_shader_stage(fixture.fragment_source(), vk::ShaderStageFlags::FRAGMENT)
            .unwrap();

        let mut vertex_input = GraphicsPipelineHelper::new(&fixture).unwrap();
        vertex_input.init_vertex_input_lib_info();
        assert_eq!(
            vertex_input.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );

        let mut pre_rasterization = GraphicsPipelineHelper::new(&fixture).unwrap();
        pre_rasterization.init_pre_raster_lib_info([pre_raster_stage]);
        assert_eq!(
            pre_rasterization.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        let layout = pre_rasterization.pipeline_layout_handle();

        let mut fragment_shader = GraphicsPipelineHelper::new(&fixture).unwrap();
        fragment_shader.init_fragment_lib_info([fragment_stage]);
        assert_eq!(
            fragment_shader.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );

        let mut fragment_output = GraphicsPipelineHelper::new(&fixture).unwrap();
        fragment_output.init_fragment_output_lib_info();
        assert_eq!(
            fragment_output.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );

        let libraries = PipelineLibraries::all(
            &vertex_input,
            &pre_rasterization,
            &fragment_shader,
            &fragment_output,
        );
        let pipeline = link_libraries(&fixture, layout, &libraries).unwrap();

        // A complete pipeline, linked in order.
        assert_eq!(device.library_flags(pipeline.handle()), None);
        assert_eq!(
            device.observed().linked_libraries,
            [
                vertex_input.handle(),
                pre_rasterization.handle(),
                fragment_shader.handle(),
                fragment_output.handle(),
            ],
        );

        assert_eq!(pipeline.bind_point(), vk::PipelineBindPoint::GRAPHICS);
        assert!(fixture.monitor().received_messages().is_empty());

        // The libraries outlive the linked pipeline, which is destroyed on its own.
        let raw = pipeline.handle().as_raw();
        assert!(device.is_live(raw));
        drop(pipeline);
        assert!(!device.is_live(raw));
        assert!(device.is_live(vertex_input.handle().as_raw()));
    }

    #[test]
    fn missing_pipeline_is_not_linked() {
        let (fixture, device) = fixture!();
        let mut vertex_input = GraphicsPipelineHelper::new(&fixture).unwrap();
        vertex_input.init_vertex_input_lib_info();
        let fragment_output = GraphicsPipelineHelper::new(&fixture).unwrap();

        assert_eq!(
            vertex_input.create_graphics_pipeline(true, false),
            vk::Result::SUCCESS,
        );
        let calls = device.observed().graphics_pipeline_calls;

        let libraries = PipelineLibraries {
            vertex_input: Some(&vertex_input),
            fragment_output: Some(&fragment_output),
            ..Default::default()
        };
        let result = link_libraries(&fixture, vk::PipelineLayout::null(), &libraries);
        assert!(matches!(
            result,
            Err(HarnessError::LibraryNotCreated {
                kind: LibraryKind::FragmentOutput,
            }),
        ));
        assert_eq!(device.observed().graphics_pipeline_calls, calls);
    }

    #[test]
    fn incomplete_link() {
        let (fixture, _device) = fixture!();
        let mut vertex_input = GraphicsPipelineHelper::new(&fixture).unwrap();
        vertex_input.init_vertex_input_lib_info();
        vertex_input.create_graphics_pipeline(true, false);

        fixture.monitor().set_desired_error(INCOMPLETE_LINK);
        let result = link_libraries(
            &fixture,
            vk::PipelineLayout::null(),
            &PipelineLibraries {
                vertex_input: Some(&vertex_input),
                ..Default::default()
            },
        );
        assert!(matches!(
            result,
            Err(HarnessError::Vulkan(vk::Result::ERROR_VALIDATION_FAILED_EXT)),
        ));
        fixture.monitor().verify_found();
    }

    #[test]
    fn simple_gpl() {
        let (fixture, device) = fixture!();
        let gpl = SimpleGpl::new(&fixture, None, None, None).unwrap();

        assert_ne!(gpl.handle(), vk::Pipeline::null());
        for kind in LibraryKind::ALL {
            assert_eq!(
                device.library_flags(gpl.library(kind).handle()),
                Some(kind.flags()),
            );
        }
        assert_eq!(
            gpl.library(LibraryKind::PreRasterization)
                .pipeline_layout_handle(),
            gpl.layout().handle(),
        );
        assert!(fixture.monitor().received_messages().is_empty());

        drop(gpl);
        assert_eq!(device.live_handles(), 1);
    }

    #[test]
    fn simple_gpl_library_failure() {
        let (fixture, device) = fixture!();
        device.queue_result(
            "vkCreateGraphicsPipelines",
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        );

        let result = SimpleGpl::new(&fixture, None, None, None);
        assert!(matches!(
            result,
            Err(HarnessError::LibraryCreation {
                kind: LibraryKind::VertexInput,
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            }),
        ));
        assert_eq!(device.observed().graphics_pipeline_calls, 1);
    }
}
