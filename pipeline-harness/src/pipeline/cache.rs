// Copyright (c) 2016 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Pipeline caches owned by a helper.
//!
//! A helper creates its cache on demand with the create info stored in its
//! `cache_create_info` field, and passes it to every creation that does not opt out. Tests that
//! compare the cached and uncached paths create twice with the same helper.

use crate::{device::PipelineDevice, NonExhaustive};
use ash::{prelude::VkResult, vk};
use std::{fmt, ptr, sync::Arc};

/// Opaque cache that contains pipeline objects. Destroyed when dropped.
pub struct PipelineCache {
    device: Arc<dyn PipelineDevice>,
    handle: vk::PipelineCache,
}

impl PipelineCache {
    /// Builds a new pipeline cache.
    pub fn new(
        device: Arc<dyn PipelineDevice>,
        create_info: &PipelineCacheCreateInfo,
    ) -> VkResult<Self> {
        let &PipelineCacheCreateInfo {
            flags,
            ref initial_data,
            _ne: _,
        } = create_info;

        let create_info_vk = vk::PipelineCacheCreateInfo {
            flags,
            initial_data_size: initial_data.len(),
            p_initial_data: if initial_data.is_empty() {
                ptr::null()
            } else {
                initial_data.as_ptr().cast()
            },
            ..Default::default()
        };

        let handle = unsafe { device.create_pipeline_cache(&create_info_vk)? };
        log::debug!("created pipeline cache {:?}", handle);

        Ok(PipelineCache { device, handle })
    }

    #[inline]
    pub fn handle(&self) -> vk::PipelineCache {
        self.handle
    }
}

impl Drop for PipelineCache {
    #[inline]
    fn drop(&mut self) {
        unsafe { self.device.destroy_pipeline_cache(self.handle) };
    }
}

impl fmt::Debug for PipelineCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Vulkan pipeline cache {:?}>", self.handle)
    }
}

/// Parameters to create a new `PipelineCache`.
#[derive(Clone, Debug)]
pub struct PipelineCacheCreateInfo {
    /// Additional properties of the pipeline cache.
    ///
    /// The default value is empty.
    pub flags: vk::PipelineCacheCreateFlags,

    /// The initial data to provide to the cache.
    ///
    /// If this is not empty, then the data must have been previously retrieved from a cache of
    /// the same implementation. The default value is empty.
    pub initial_data: Vec<u8>,

    pub _ne: NonExhaustive,
}

impl Default for PipelineCacheCreateInfo {
    #[inline]
    fn default() -> Self {
        Self {
            flags: vk::PipelineCacheCreateFlags::empty(),
            initial_data: Vec::new(),
            _ne: NonExhaustive(()),
        }
    }
}
