// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Describing, creating and composing pipelines.
//!
//! There are two kinds of helpers, one per pipeline type:
//!
//! - [`GraphicsPipelineHelper`](graphics::GraphicsPipelineHelper) describes a graphics pipeline
//!   with one record per fixed-function slot. It can also describe one of the four kinds of
//!   graphics pipeline library, which [`library`] links into a single pipeline.
//! - [`ComputePipelineHelper`](compute::ComputePipelineHelper) describes a compute pipeline.
//!
//! Both own the objects they create: the [`Pipeline`], its [`PipelineLayout`](layout::PipelineLayout)
//! unless one is supplied, and the [`PipelineCache`](cache::PipelineCache) if one was requested.

use crate::device::PipelineDevice;
use ash::vk;
use std::{fmt, sync::Arc};

pub mod cache;
pub mod compute;
pub mod graphics;
pub mod layout;
pub mod library;

/// A pipeline created by a helper. Destroyed when dropped.
pub struct Pipeline {
    device: Arc<dyn PipelineDevice>,
    handle: vk::Pipeline,
    bind_point: vk::PipelineBindPoint,
}

impl Pipeline {
    /// Takes ownership of `handle`.
    ///
    /// # Safety
    ///
    /// - `handle` must be a pipeline created from `device`, not owned by anything else.
    #[inline]
    pub(crate) unsafe fn from_handle(
        device: Arc<dyn PipelineDevice>,
        handle: vk::Pipeline,
        bind_point: vk::PipelineBindPoint,
    ) -> Self {
        Pipeline {
            device,
            handle,
            bind_point,
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::Pipeline {
        self.handle
    }

    /// Returns the bind point the pipeline must be bound to.
    #[inline]
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        self.bind_point
    }
}

impl Drop for Pipeline {
    #[inline]
    fn drop(&mut self) {
        log::trace!("destroying pipeline {:?}", self.handle);
        unsafe { self.device.destroy_pipeline(self.handle) };
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Vulkan {:?} pipeline {:?}>", self.bind_point, self.handle)
    }
}
