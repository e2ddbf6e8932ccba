// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Shader sources, their compilation, and the shader stages of a pipeline.
//!
//! A [`ShaderStage`] either refers to a [`ShaderModule`] or carries its SPIR-V inline. Inline code
//! is passed to pipeline creation by chaining a `VkShaderModuleCreateInfo` to the stage, which is
//! how the stages of graphics pipeline libraries are usually given.

use crate::device::PipelineDevice;
use ash::{prelude::VkResult, vk};
use std::{
    error::Error,
    ffi::CStr,
    fmt::{Debug, Error as FmtError, Formatter},
    ptr,
    sync::Arc,
};

/// The magic number at the start of every SPIR-V module.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/*
 * #version 450
 * void main() {
 * }
 */
/// A vertex shader that does nothing.
pub const VERTEX_MINIMAL_SPIRV: [u32; 42] = [
    119734787, 65536, 524298, 6, 0, 131089, 1, 393227, 1, 1280527431, 1685353262, 808793134, 0,
    196622, 0, 1, 327695, 0, 4, 1852399981, 0, 196611, 2, 450, 262149, 4, 1852399981, 0, 131091,
    2, 196641, 3, 2, 327734, 2, 4, 0, 3, 131320, 5, 65789, 65592,
];

/*
 * #version 450
 * void main() {
 * }
 */
/// A fragment shader that writes no output.
pub const FRAGMENT_MINIMAL_SPIRV: [u32; 45] = [
    119734787, 65536, 524298, 6, 0, 131089, 1, 393227, 1, 1280527431, 1685353262, 808793134, 0,
    196622, 0, 1, 327695, 4, 4, 1852399981, 0, 196624, 4, 7, 196611, 2, 450, 262149, 4,
    1852399981, 0, 131091, 2, 196641, 3, 2, 327734, 2, 4, 0, 3, 131320, 5, 65789, 65592,
];

/*
 * #version 450
 * layout(local_size_x = 1, local_size_y = 1, local_size_z = 1) in;
 * void main() {
 * }
 */
/// A compute shader that does nothing.
pub const COMPUTE_MINIMAL_SPIRV: [u32; 48] = [
    119734787, 65536, 524298, 6, 0, 131089, 1, 393227, 1, 1280527431, 1685353262, 808793134, 0,
    196622, 0, 1, 327695, 5, 4, 1852399981, 0, 393232, 4, 17, 1, 1, 1, 196611, 2, 450, 262149, 4,
    1852399981, 0, 131091, 2, 196641, 3, 2, 327734, 2, 4, 0, 3, 131320, 5, 65789, 65592,
];

/// The source of a shader, as given by a test.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShaderSource {
    /// GLSL text. Needs a compiler that understands GLSL.
    Glsl(String),
    /// Ready SPIR-V words.
    Spirv(Arc<[u32]>),
}

impl ShaderSource {
    /// Returns a `ShaderSource` holding a copy of `words`.
    #[inline]
    pub fn spirv(words: &[u32]) -> Self {
        Self::Spirv(Arc::from(words))
    }

    /// Returns a `ShaderSource` holding `text`.
    #[inline]
    pub fn glsl(text: impl Into<String>) -> Self {
        Self::Glsl(text.into())
    }
}

/// Turns shader sources into SPIR-V.
pub trait ShaderCompiler {
    fn compile(
        &self,
        source: &ShaderSource,
        stage: vk::ShaderStageFlags,
    ) -> Result<Arc<[u32]>, CompileError>;
}

/// A compiler that only accepts SPIR-V, checking its header.
#[derive(Clone, Copy, Debug, Default)]
pub struct SpirvPassthrough;

impl ShaderCompiler for SpirvPassthrough {
    fn compile(
        &self,
        source: &ShaderSource,
        _stage: vk::ShaderStageFlags,
    ) -> Result<Arc<[u32]>, CompileError> {
        match source {
            ShaderSource::Spirv(words) => {
                // The header is five words long.
                if words.len() < 5 || words[0] != SPIRV_MAGIC {
                    return Err(CompileError::InvalidSpirv);
                }

                Ok(words.clone())
            }
            ShaderSource::Glsl(_) => Err(CompileError::Unsupported),
        }
    }
}

/// A compiler that turns GLSL into SPIR-V with shaderc.
#[cfg(feature = "shaderc")]
pub struct ShadercCompiler {
    compiler: parking_lot::Mutex<shaderc::Compiler>,
}

#[cfg(feature = "shaderc")]
impl ShadercCompiler {
    /// Returns `None` if shaderc could not be initialized.
    pub fn new() -> Option<Self> {
        shaderc::Compiler::new().map(|compiler| Self {
            compiler: parking_lot::Mutex::new(compiler),
        })
    }
}

#[cfg(feature = "shaderc")]
impl ShaderCompiler for ShadercCompiler {
    fn compile(
        &self,
        source: &ShaderSource,
        stage: vk::ShaderStageFlags,
    ) -> Result<Arc<[u32]>, CompileError> {
        let text = match source {
            ShaderSource::Glsl(text) => text,
            ShaderSource::Spirv(_) => return SpirvPassthrough.compile(source, stage),
        };

        let kind = match stage {
            vk::ShaderStageFlags::VERTEX => shaderc::ShaderKind::Vertex,
            vk::ShaderStageFlags::TESSELLATION_CONTROL => shaderc::ShaderKind::TessControl,
            vk::ShaderStageFlags::TESSELLATION_EVALUATION => shaderc::ShaderKind::TessEvaluation,
            vk::ShaderStageFlags::GEOMETRY => shaderc::ShaderKind::Geometry,
            vk::ShaderStageFlags::FRAGMENT => shaderc::ShaderKind::Fragment,
            vk::ShaderStageFlags::COMPUTE => shaderc::ShaderKind::Compute,
            _ => return Err(CompileError::Unsupported),
        };

        let artifact = self
            .compiler
            .lock()
            .compile_into_spirv(text, kind, "shader.glsl", "main", None)
            .map_err(|err| CompileError::Failed(err.to_string()))?;

        Ok(Arc::from(artifact.as_binary()))
    }
}

/// Error that can happen when compiling a shader.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CompileError {
    /// The compiler does not handle this kind of source or stage.
    Unsupported,
    /// The words do not start with a SPIR-V header.
    InvalidSpirv,
    /// The compiler rejected the source.
    Failed(String),
}

impl Error for CompileError {}

impl std::fmt::Display for CompileError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        match self {
            Self::Unsupported => write!(f, "the compiler does not support this shader source"),
            Self::InvalidSpirv => write!(f, "the code is not a SPIR-V module"),
            Self::Failed(log) => write!(f, "compilation failed: {}", log),
        }
    }
}

/// A shader module, destroyed when dropped.
pub struct ShaderModule {
    device: Arc<dyn PipelineDevice>,
    handle: vk::ShaderModule,
}

impl ShaderModule {
    /// Creates a shader module from SPIR-V words.
    pub fn new(device: Arc<dyn PipelineDevice>, code: &[u32]) -> VkResult<Arc<Self>> {
        let create_info = vk::ShaderModuleCreateInfo::default().code(code);
        let handle = unsafe { device.create_shader_module(&create_info)? };

        Ok(Arc::new(ShaderModule { device, handle }))
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }
}

impl Drop for ShaderModule {
    #[inline]
    fn drop(&mut self) {
        unsafe { self.device.destroy_shader_module(self.handle) };
    }
}

impl Debug for ShaderModule {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), FmtError> {
        write!(f, "<Vulkan shader module {:?}>", self.handle)
    }
}

/// Where the code of a [`ShaderStage`] comes from.
#[derive(Clone, Debug)]
pub enum ShaderCode {
    Module(Arc<ShaderModule>),
    /// SPIR-V passed through a chained `VkShaderModuleCreateInfo`, with a null module handle.
    Inline(Arc<[u32]>),
}

/// One shader stage of a pipeline.
#[derive(Clone, Debug)]
pub struct ShaderStage {
    /// The default value is empty.
    pub flags: vk::PipelineShaderStageCreateFlags,

    /// There is no default value.
    pub stage: vk::ShaderStageFlags,

    /// There is no default value.
    pub code: ShaderCode,

    /// The default value is `main`.
    pub entry_point: Arc<CStr>,
}

impl ShaderStage {
    /// Returns a `ShaderStage` running `main` from `module`.
    #[inline]
    pub fn new(stage: vk::ShaderStageFlags, module: Arc<ShaderModule>) -> Self {
        Self {
            flags: vk::PipelineShaderStageCreateFlags::empty(),
            stage,
            code: ShaderCode::Module(module),
            entry_point: Arc::from(c"main"),
        }
    }

    /// Returns a `ShaderStage` running `main` from inline SPIR-V.
    #[inline]
    pub fn inline(stage: vk::ShaderStageFlags, code: Arc<[u32]>) -> Self {
        Self {
            flags: vk::PipelineShaderStageCreateFlags::empty(),
            stage,
            code: ShaderCode::Inline(code),
            entry_point: Arc::from(c"main"),
        }
    }

    /// Sets the entry point name.
    #[inline]
    pub fn with_entry_point(mut self, name: &CStr) -> Self {
        self.entry_point = Arc::from(name);
        self
    }

    /// Returns the module create info to chain to the stage. Empty for module-backed stages.
    ///
    /// The pointers refer to `self`, which must outlive any use of the result.
    pub(crate) fn module_create_info(&self) -> vk::ShaderModuleCreateInfo<'static> {
        let mut create_info = vk::ShaderModuleCreateInfo::default();

        if let ShaderCode::Inline(code) = &self.code {
            create_info.code_size = std::mem::size_of_val(&code[..]);
            create_info.p_code = code.as_ptr();
        }

        create_info
    }

    /// Returns the stage create info. `module_create_info` is chained for inline code.
    ///
    /// The pointers refer to `self` and `module_create_info`, which must outlive any use of the
    /// result.
    pub(crate) fn stage_create_info(
        &self,
        module_create_info: &vk::ShaderModuleCreateInfo<'static>,
    ) -> vk::PipelineShaderStageCreateInfo<'static> {
        let mut create_info = vk::PipelineShaderStageCreateInfo {
            flags: self.flags,
            stage: self.stage,
            p_name: self.entry_point.as_ptr(),
            ..Default::default()
        };

        match &self.code {
            ShaderCode::Module(module) => create_info.module = module.handle(),
            ShaderCode::Inline(_) => {
                create_info.module = vk::ShaderModule::null();
                create_info.p_next = ptr::from_ref(module_create_info).cast();
            }
        }

        create_info
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CompileError, ShaderCode, ShaderCompiler, ShaderSource, ShaderStage, SpirvPassthrough,
        COMPUTE_MINIMAL_SPIRV, FRAGMENT_MINIMAL_SPIRV, SPIRV_MAGIC, VERTEX_MINIMAL_SPIRV,
    };
    use ash::vk;
    use std::{ffi::CStr, sync::Arc};

    #[test]
    fn minimal_modules_have_a_header() {
        for words in [
            &VERTEX_MINIMAL_SPIRV[..],
            &FRAGMENT_MINIMAL_SPIRV[..],
            &COMPUTE_MINIMAL_SPIRV[..],
        ] {
            assert_eq!(words[0], SPIRV_MAGIC);
            // The id bound.
            assert_eq!(words[3], 6);
            // Every module ends with OpFunctionEnd.
            assert_eq!(*words.last().unwrap(), 65592);
        }
    }

    #[test]
    fn passthrough_checks_header() {
        let compiler = SpirvPassthrough;

        let words = compiler
            .compile(
                &ShaderSource::spirv(&VERTEX_MINIMAL_SPIRV),
                vk::ShaderStageFlags::VERTEX,
            )
            .unwrap();
        assert_eq!(&words[..], &VERTEX_MINIMAL_SPIRV[..]);

        assert_eq!(
            compiler.compile(
                &ShaderSource::spirv(&[0xdead_beef, 0, 0, 0, 0]),
                vk::ShaderStageFlags::VERTEX,
            ),
            Err(CompileError::InvalidSpirv),
        );
        assert_eq!(
            compiler.compile(
                &ShaderSource::glsl("#version 450\nvoid main() {}"),
                vk::ShaderStageFlags::VERTEX,
            ),
            Err(CompileError::Unsupported),
        );
    }

    #[test]
    fn inline_stage_chains_module_info() {
        let code: Arc<[u32]> = Arc::from(&FRAGMENT_MINIMAL_SPIRV[..]);
        let stage = ShaderStage::inline(vk::ShaderStageFlags::FRAGMENT, code.clone())
            .with_entry_point(c"frag_main");
        assert!(matches!(stage.code, ShaderCode::Inline(_)));

        let module_info = stage.module_create_info();
        assert_eq!(module_info.code_size, FRAGMENT_MINIMAL_SPIRV.len() * 4);
        assert_eq!(module_info.p_code, code.as_ptr());

        let stage_info = stage.stage_create_info(&module_info);
        assert_eq!(stage_info.stage, vk::ShaderStageFlags::FRAGMENT);
        assert_eq!(stage_info.module, vk::ShaderModule::null());
        assert_eq!(
            stage_info.p_next.cast::<vk::ShaderModuleCreateInfo<'_>>(),
            std::ptr::from_ref(&module_info),
        );
        assert_eq!(
            unsafe { CStr::from_ptr(stage_info.p_name) },
            c"frag_main",
        );
    }
}
