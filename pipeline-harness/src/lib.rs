// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Pipeline construction and error-assertion harness for validation layer tests.
//!
//! # Brief summary
//!
//! - A [`TestFixture`](crate::fixture::TestFixture) bundles the collaborators every test needs:
//!   a [`PipelineDevice`](crate::device::PipelineDevice) to create objects with, an
//!   [`ErrorMonitor`](crate::debug::ErrorMonitor) that observes the diagnostics emitted while
//!   doing so, a [`ShaderCompiler`](crate::shader::ShaderCompiler), and a default render target.
//!
//! - A [`GraphicsPipelineHelper`](crate::pipeline::graphics::GraphicsPipelineHelper) or
//!   [`ComputePipelineHelper`](crate::pipeline::compute::ComputePipelineHelper) holds a fully
//!   populated pipeline description. Creating it without touching anything yields a valid
//!   pipeline. Tests change only the fields relevant to the behavior they probe.
//!
//! - Before creation, the helper *late-binds* its description: every pointer/count pair of the
//!   top-level create-info is re-derived from the current field values. Late binding is a
//!   separate step so that a test can deliberately create with a stale binding.
//!
//! - [`oneshot_test`](crate::oneshot::oneshot_test) runs the usual test shape in one call:
//!   build a helper, let the caller mutate it, register the expected diagnostics, create, and
//!   verify.
//!
//! - [`SimpleGpl`](crate::pipeline::library::SimpleGpl) and
//!   [`link_libraries`](crate::pipeline::library::link_libraries) compose graphics pipeline
//!   libraries into a single linked pipeline.

use std::{error::Error, fmt};

pub use ash::vk;

mod aliasable_box;
pub mod debug;
pub mod device;
pub mod fixture;
pub mod oneshot;
pub mod pipeline;
pub mod render_pass;
pub mod shader;

use crate::{pipeline::library::LibraryKind, shader::CompileError};

/// Error that can happen while the harness sets up objects around the call under test.
///
/// The call under test itself never produces a `HarnessError`: its outcome is returned as a raw
/// [`vk::Result`] so that failure can be asserted like any other outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HarnessError {
    /// A Vulkan call returned an error code.
    Vulkan(vk::Result),

    /// A shader source could not be turned into SPIR-V.
    Compile(CompileError),

    /// Creating one of the libraries of a composed pipeline failed.
    LibraryCreation {
        kind: LibraryKind,
        result: vk::Result,
    },

    /// A library was given for linking but it has no pipeline.
    LibraryNotCreated { kind: LibraryKind },
}

impl Error for HarnessError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Vulkan(err) => Some(err),
            Self::Compile(err) => Some(err),
            Self::LibraryCreation { result, .. } => Some(result),
            Self::LibraryNotCreated { .. } => None,
        }
    }
}

impl fmt::Display for HarnessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vulkan(_) => write!(f, "a Vulkan call returned an error"),
            Self::Compile(_) => write!(f, "a shader failed to compile"),
            Self::LibraryCreation { kind, result } => write!(
                f,
                "creating the {} library failed with {:?}",
                kind, result,
            ),
            Self::LibraryNotCreated { kind } => write!(
                f,
                "the {} library was given for linking but has not been created",
                kind,
            ),
        }
    }
}

impl From<vk::Result> for HarnessError {
    #[inline]
    fn from(err: vk::Result) -> Self {
        Self::Vulkan(err)
    }
}

impl From<CompileError> for HarnessError {
    #[inline]
    fn from(err: CompileError) -> Self {
        Self::Compile(err)
    }
}

/// A helper type for non-exhaustive structs.
///
/// This type cannot be constructed outside this crate. Structures with a field of this type can
/// only be constructed by calling a constructor function or `Default::default()`, while update
/// syntax stays available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NonExhaustive(pub(crate) ());
