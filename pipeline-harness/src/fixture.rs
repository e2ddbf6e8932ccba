// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The collaborators shared by every pipeline helper of a test.
//!
//! A [`TestFixture`] is created once per test. It owns the default render target and knows the
//! default shader sources and descriptor bindings that helpers start from. Helpers borrow it, so
//! the device and render target outlive every helper built against them.

use crate::{
    debug::{ErrorMonitor, Severity},
    device::PipelineDevice,
    pipeline::graphics::state::DescriptorBinding,
    render_pass::RenderPass,
    shader::{
        CompileError, ShaderCompiler, ShaderModule, ShaderSource, ShaderStage,
        COMPUTE_MINIMAL_SPIRV, FRAGMENT_MINIMAL_SPIRV, VERTEX_MINIMAL_SPIRV,
    },
    HarnessError, NonExhaustive,
};
use ash::vk;
use std::{fmt, sync::Arc};

/// The identifier of the diagnostic reported when a shader fails to compile.
///
/// A test that expects a compile failure registers it with the monitor like any other
/// diagnostic.
pub const COMPILE_FAILURE_ID: &str = "UNASSIGNED-Harness-ShaderCompile";

/// Parameters to create a new `TestFixture`.
#[derive(Clone, Debug)]
pub struct TestFixtureCreateInfo {
    /// The format of the color attachment of the default render target.
    ///
    /// The default value is `R8G8B8A8_UNORM`.
    pub color_format: vk::Format,

    /// The size of the default render target.
    ///
    /// The default value is `[64, 64]`.
    pub extent: [u32; 2],

    /// The descriptor bindings graphics helpers start from.
    ///
    /// The default value is a single uniform buffer at binding 0, visible to all stages.
    pub graphics_bindings: Vec<DescriptorBinding>,

    /// The descriptor bindings compute helpers start from.
    ///
    /// The default value is a single storage buffer at binding 0, visible to the compute stage.
    pub compute_bindings: Vec<DescriptorBinding>,

    /// The default value is [`VERTEX_MINIMAL_SPIRV`].
    pub vertex_source: ShaderSource,

    /// The default value is [`FRAGMENT_MINIMAL_SPIRV`].
    pub fragment_source: ShaderSource,

    /// The default value is [`COMPUTE_MINIMAL_SPIRV`].
    pub compute_source: ShaderSource,

    pub _ne: NonExhaustive,
}

impl Default for TestFixtureCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            color_format: vk::Format::R8G8B8A8_UNORM,
            extent: [64, 64],
            graphics_bindings: vec![DescriptorBinding::new(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::ALL,
            )],
            compute_bindings: vec![DescriptorBinding::new(
                0,
                vk::DescriptorType::STORAGE_BUFFER,
                vk::ShaderStageFlags::COMPUTE,
            )],
            vertex_source: ShaderSource::spirv(&VERTEX_MINIMAL_SPIRV),
            fragment_source: ShaderSource::spirv(&FRAGMENT_MINIMAL_SPIRV),
            compute_source: ShaderSource::spirv(&COMPUTE_MINIMAL_SPIRV),
            _ne: NonExhaustive(()),
        }
    }
}

/// The per-test collaborators: device, error monitor, shader compiler and render target.
///
/// When dropped outside of a panic, the fixture asserts that the monitor holds neither an
/// unverified expectation nor an unexpected error.
pub struct TestFixture {
    device: Arc<dyn PipelineDevice>,
    monitor: ErrorMonitor,
    compiler: Arc<dyn ShaderCompiler>,
    render_pass: RenderPass,
    create_info: TestFixtureCreateInfo,
}

impl TestFixture {
    /// Creates the default render target and bundles it with the collaborators.
    pub fn new(
        device: Arc<dyn PipelineDevice>,
        monitor: ErrorMonitor,
        compiler: Arc<dyn ShaderCompiler>,
        create_info: TestFixtureCreateInfo,
    ) -> Result<Self, HarnessError> {
        let render_pass = RenderPass::new(device.clone(), create_info.color_format)?;

        Ok(TestFixture {
            device,
            monitor,
            compiler,
            render_pass,
            create_info,
        })
    }

    #[inline]
    pub fn device(&self) -> &Arc<dyn PipelineDevice> {
        &self.device
    }

    #[inline]
    pub fn monitor(&self) -> &ErrorMonitor {
        &self.monitor
    }

    /// Returns the default render target.
    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    #[inline]
    pub fn extent(&self) -> [u32; 2] {
        self.create_info.extent
    }

    #[inline]
    pub fn graphics_bindings(&self) -> &[DescriptorBinding] {
        &self.create_info.graphics_bindings
    }

    #[inline]
    pub fn compute_bindings(&self) -> &[DescriptorBinding] {
        &self.create_info.compute_bindings
    }

    #[inline]
    pub fn vertex_source(&self) -> &ShaderSource {
        &self.create_info.vertex_source
    }

    #[inline]
    pub fn fragment_source(&self) -> &ShaderSource {
        &self.create_info.fragment_source
    }

    #[inline]
    pub fn compute_source(&self) -> &ShaderSource {
        &self.create_info.compute_source
    }

    /// Compiles `source` for `stage`.
    ///
    /// A failure is reported to the monitor as [`COMPILE_FAILURE_ID`] before being returned.
    pub fn compile(
        &self,
        source: &ShaderSource,
        stage: vk::ShaderStageFlags,
    ) -> Result<Arc<[u32]>, CompileError> {
        self.compiler.compile(source, stage).inspect_err(|err| {
            self.monitor.report(
                Severity::ERROR,
                Some(COMPILE_FAILURE_ID),
                &format!("{:?} shader: {}", stage, err),
            );
        })
    }

    /// Compiles `source` and creates a module-backed stage from it.
    pub fn create_shader_stage(
        &self,
        source: &ShaderSource,
        stage: vk::ShaderStageFlags,
    ) -> Result<ShaderStage, HarnessError> {
        let code = self.compile(source, stage)?;
        let module = ShaderModule::new(self.device.clone(), &code)?;

        Ok(ShaderStage::new(stage, module))
    }

    /// Compiles `source` into a stage that carries its code inline, as used by pipeline
    /// libraries.
    pub fn create_inline_shader_stage(
        &self,
        source: &ShaderSource,
        stage: vk::ShaderStageFlags,
    ) -> Result<ShaderStage, HarnessError> {
        let code = self.compile(source, stage)?;

        Ok(ShaderStage::inline(stage, code))
    }
}

impl Drop for TestFixture {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }

        if let Err(report) = self.monitor.check_found() {
            self.monitor.reset();
            panic!("at the end of the test: {}", report);
        }
    }
}

impl fmt::Debug for TestFixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestFixture")
            .field("monitor", &self.monitor)
            .field("render_pass", &self.render_pass)
            .field("create_info", &self.create_info)
            .finish_non_exhaustive()
    }
}
