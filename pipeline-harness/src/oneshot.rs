// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! The construct, mutate, create and verify cycle in one call.
//!
//! Most tests have the same shape: build a default helper, change one thing, say which
//! diagnostics the change must produce, create, and check that they were produced.
//! [`oneshot_test`] runs that shape:
//!
//! ```no_run
//! # fn test(fixture: &pipeline_harness::fixture::TestFixture) {
//! use pipeline_harness::{
//!     debug::Severity, oneshot::NO_ERRORS, pipeline::graphics::GraphicsPipelineHelper, vk,
//! };
//!
//! // A line width other than 1.0 requires the `wideLines` feature.
//! GraphicsPipelineHelper::oneshot_test(
//!     fixture,
//!     |helper| helper.rasterization_state.as_mut().unwrap().line_width = 2.0,
//!     Severity::ERROR,
//!     ["VUID-VkGraphicsPipelineCreateInfo-pDynamicStates-00749"],
//! );
//!
//! // Making it dynamic makes the pipeline valid again.
//! GraphicsPipelineHelper::oneshot_test(
//!     fixture,
//!     |helper| {
//!         helper.rasterization_state.as_mut().unwrap().line_width = 2.0;
//!         helper.add_dynamic_state(vk::DynamicState::LINE_WIDTH);
//!     },
//!     Severity::ERROR,
//!     NO_ERRORS,
//! );
//! # }
//! ```
//!
//! An empty list of expected diagnostics means the creation must succeed silently. The monitor
//! is then not asked to verify anything, and an unexpected error is caught when the fixture is
//! dropped.

use crate::{
    debug::Severity,
    fixture::TestFixture,
    pipeline::{compute::ComputePipelineHelper, graphics::GraphicsPipelineHelper},
    HarnessError,
};
use ash::vk;

/// The empty list of expected diagnostics.
pub const NO_ERRORS: [&str; 0] = [];

/// A pipeline helper that [`oneshot_test`] can drive.
pub trait OneshotHelper<'a>: Sized {
    /// Returns a default helper built against `fixture`.
    fn new(fixture: &'a TestFixture) -> Result<Self, HarnessError>;

    /// Late-binds and creates the pipeline, returning the result of the creation call.
    fn create(&mut self) -> vk::Result;

    /// Returns whether the caller asked for creation to be skipped, and clears the request.
    ///
    /// The default implementation never skips.
    #[inline]
    fn take_skip(&mut self) -> bool {
        false
    }
}

impl<'a> OneshotHelper<'a> for GraphicsPipelineHelper<'a> {
    #[inline]
    fn new(fixture: &'a TestFixture) -> Result<Self, HarnessError> {
        GraphicsPipelineHelper::new(fixture)
    }

    #[inline]
    fn create(&mut self) -> vk::Result {
        self.create_graphics_pipeline(true, false)
    }
}

impl<'a> OneshotHelper<'a> for ComputePipelineHelper<'a> {
    #[inline]
    fn new(fixture: &'a TestFixture) -> Result<Self, HarnessError> {
        ComputePipelineHelper::new(fixture)
    }

    #[inline]
    fn create(&mut self) -> vk::Result {
        self.create_compute_pipeline(true, false)
    }

    #[inline]
    fn take_skip(&mut self) -> bool {
        std::mem::take(&mut self.override_skip)
    }
}

/// Builds a default `H`, lets `info_override` change it, then creates it while expecting
/// `errors`, each with `severity`.
///
/// Expectations are registered after `info_override` has run and before creation. If `errors`
/// is not empty, the monitor verifies them right after creation. If the helper asks to skip,
/// nothing is registered, created or verified.
///
/// `errors` can be any sequence of strings: [`NO_ERRORS`], an array, a `Vec`, or `Some(id)` for
/// a single identifier.
///
/// # Panics
///
/// - Panics if the default helper can't be built.
/// - Panics if an expected diagnostic was not observed, or an unexpected error was observed
///   while expecting at least one diagnostic.
pub fn oneshot_test<'a, H, I>(
    fixture: &'a TestFixture,
    info_override: impl FnOnce(&mut H),
    severity: Severity,
    errors: I,
) where
    H: OneshotHelper<'a>,
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut helper = match H::new(fixture) {
        Ok(helper) => helper,
        Err(err) => panic!("failed to set up the pipeline helper: {}", err),
    };

    info_override(&mut helper);

    if helper.take_skip() {
        log::debug!("oneshot creation skipped on request");
        return;
    }

    let monitor = fixture.monitor();
    let mut expects_diagnostics = false;

    for id in errors {
        monitor.set_desired_failure_msg(severity, id.as_ref());
        expects_diagnostics = true;
    }

    let result = helper.create();
    log::debug!("oneshot creation returned {:?}", result);

    if expects_diagnostics {
        monitor.verify_found();
    }
}

impl<'a> GraphicsPipelineHelper<'a> {
    /// Runs [`oneshot_test`] with a graphics pipeline helper.
    #[inline]
    pub fn oneshot_test<I>(
        fixture: &'a TestFixture,
        info_override: impl FnOnce(&mut Self),
        severity: Severity,
        errors: I,
    ) where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        oneshot_test(fixture, info_override, severity, errors);
    }
}

impl<'a> ComputePipelineHelper<'a> {
    /// Runs [`oneshot_test`] with a compute pipeline helper.
    ///
    /// Setting [`override_skip`](Self::override_skip) in `info_override` skips the creation.
    #[inline]
    pub fn oneshot_test<I>(
        fixture: &'a TestFixture,
        info_override: impl FnOnce(&mut Self),
        severity: Severity,
        errors: I,
    ) where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        oneshot_test(fixture, info_override, severity, errors);
    }
}
