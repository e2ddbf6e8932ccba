// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The default render target of a fixture.

use crate::device::PipelineDevice;
use ash::{prelude::VkResult, vk};
use std::{fmt, sync::Arc};

/// A render pass with a single subpass writing one color attachment. Destroyed when dropped.
pub struct RenderPass {
    device: Arc<dyn PipelineDevice>,
    handle: vk::RenderPass,
    color_format: vk::Format,
}

impl RenderPass {
    /// Creates a render pass whose only subpass writes one attachment of `color_format`.
    pub fn new(device: Arc<dyn PipelineDevice>, color_format: vk::Format) -> VkResult<Self> {
        let attachments = [vk::AttachmentDescription {
            format: color_format,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            ..Default::default()
        }];
        let color_attachments = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachments)];
        let create_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses);

        let handle = unsafe { device.create_render_pass(&create_info)? };
        log::debug!("created render pass {:?} ({:?})", handle, color_format);

        Ok(RenderPass {
            device,
            handle,
            color_format,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::RenderPass {
        self.handle
    }

    /// Returns the format of the color attachment.
    #[inline]
    pub fn color_format(&self) -> vk::Format {
        self.color_format
    }

    /// Returns the number of color attachments of subpass 0, which is always 1.
    #[inline]
    pub fn color_attachment_count(&self) -> u32 {
        1
    }
}

impl Drop for RenderPass {
    #[inline]
    fn drop(&mut self) {
        unsafe { self.device.destroy_render_pass(self.handle) };
    }
}

impl fmt::Debug for RenderPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPass")
            .field("handle", &self.handle)
            .field("color_format", &self.color_format)
            .finish_non_exhaustive()
    }
}
