// Copyright (c) 2024 The vulkano developers
// Licensed under the Apache License, Version 2.0
// <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT
// license <LICENSE-MIT or https://opensource.org/licenses/MIT>,
// at your option. All files in the project carrying such
// notice may not be copied, modified, or distributed except
// according to those terms.

//! Observing the diagnostics emitted while a test runs.
//!
//! The [`ErrorMonitor`] receives every message of the validation layer, either through the debug
//! messenger built by [`ErrorMonitor::messenger_create_info`] or by a direct call to
//! [`ErrorMonitor::report`]. A test first registers the diagnostics it expects, then performs the
//! operation under test, then asks the monitor to verify:
//!
//! ```
//! use pipeline_harness::{debug::ErrorMonitor, vk};
//!
//! let monitor = ErrorMonitor::new();
//! monitor.set_desired_error("VUID-VkPipelineDynamicStateCreateInfo-pDynamicStates-01442");
//!
//! // The operation under test triggers the layer, which ends up here.
//! monitor.report(
//!     vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
//!     Some("VUID-VkPipelineDynamicStateCreateInfo-pDynamicStates-01442"),
//!     "duplicate dynamic state",
//! );
//!
//! monitor.verify_found();
//! ```
//!
//! A desired identifier matches a message when their severities intersect and the identifier is
//! a substring of the message id name or of the message text.

use ash::vk;
use parking_lot::Mutex;
use std::{
    error::Error,
    ffi::{c_void, CStr},
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
};

/// Severity of a diagnostic, as reported by the debug messenger.
pub type Severity = vk::DebugUtilsMessageSeverityFlagsEXT;

/// Collects the diagnostics emitted during a test and checks them against expectations.
///
/// Cloning an `ErrorMonitor` gives another handle to the same state.
#[derive(Clone, Default)]
pub struct ErrorMonitor {
    state: Arc<Mutex<MonitorState>>,
}

#[derive(Debug, Default)]
struct MonitorState {
    desired: Vec<DesiredMessage>,
    allowed: Vec<String>,
    found: Vec<String>,
    unexpected: Vec<ReceivedMessage>,
    received: Vec<ReceivedMessage>,
    verification_count: u32,
}

#[derive(Debug)]
struct DesiredMessage {
    severity: Severity,
    id: String,
    remaining: u32,
}

impl ErrorMonitor {
    /// Creates a monitor that expects nothing.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `id` as a diagnostic that must be observed once with a severity in `severity`.
    #[inline]
    pub fn set_desired_failure_msg(&self, severity: Severity, id: impl Into<String>) {
        self.set_desired_failure_msg_count(severity, id, 1);
    }

    /// Registers `id` as a diagnostic that must be observed `count` times.
    ///
    /// # Panics
    ///
    /// - Panics if `count` is zero.
    pub fn set_desired_failure_msg_count(
        &self,
        severity: Severity,
        id: impl Into<String>,
        count: u32,
    ) {
        assert!(count != 0, "a desired diagnostic must be expected at least once");

        let id = id.into();
        log::trace!("desired {:?} diagnostic {} (x{})", severity, id, count);

        self.state.lock().desired.push(DesiredMessage {
            severity,
            id,
            remaining: count,
        });
    }

    /// Registers `id` as an error that must be observed once.
    #[inline]
    pub fn set_desired_error(&self, id: impl Into<String>) {
        self.set_desired_failure_msg(Severity::ERROR, id);
    }

    /// Registers `id` as a warning that must be observed once.
    #[inline]
    pub fn set_desired_warning(&self, id: impl Into<String>) {
        self.set_desired_failure_msg(Severity::WARNING, id);
    }

    /// Tolerates diagnostics matching `id` without requiring them.
    pub fn set_allowed_failure_msg(&self, id: impl Into<String>) {
        self.state.lock().allowed.push(id.into());
    }

    /// Feeds one diagnostic into the monitor.
    pub fn report(&self, severity: Severity, message_id_name: Option<&str>, text: &str) {
        report_to(&self.state, severity, message_id_name, text);
    }

    /// Returns whether expectations have been registered and not verified yet.
    #[inline]
    pub fn has_desired(&self) -> bool {
        !self.state.lock().desired.is_empty()
    }

    /// Returns every diagnostic received since the last reset.
    pub fn received_messages(&self) -> Vec<ReceivedMessage> {
        self.state.lock().received.clone()
    }

    /// Returns how many times [`verify_found`](Self::verify_found) has run.
    #[inline]
    pub fn verification_count(&self) -> u32 {
        self.state.lock().verification_count
    }

    /// Checks that every desired diagnostic has been observed and that no unexpected error was
    /// observed. Nothing is reset.
    pub fn check_found(&self) -> Result<(), MonitorReport> {
        let state = self.state.lock();

        let missing: Vec<String> = state
            .desired
            .iter()
            .map(|desired| desired.id.clone())
            .collect();

        if missing.is_empty() && state.unexpected.is_empty() {
            Ok(())
        } else {
            Err(MonitorReport {
                missing,
                unexpected: state.unexpected.clone(),
            })
        }
    }

    /// Asserts that every desired diagnostic has been observed and that no unexpected error was
    /// observed, then resets the monitor for the next operation.
    ///
    /// # Panics
    ///
    /// - Panics with the list of missing and unexpected diagnostics if the check fails.
    pub fn verify_found(&self) {
        let result = self.check_found();

        {
            let mut state = self.state.lock();
            state.verification_count += 1;
            state.reset();
        }

        if let Err(report) = result {
            panic!("{}", report);
        }
    }

    /// Asserts that no unexpected error has been observed.
    ///
    /// # Panics
    ///
    /// - Panics with the list of unexpected diagnostics if there are any.
    pub fn verify_not_found(&self) {
        let unexpected = std::mem::take(&mut self.state.lock().unexpected);

        if !unexpected.is_empty() {
            panic!(
                "{}",
                MonitorReport {
                    missing: Vec::new(),
                    unexpected,
                }
            );
        }
    }

    /// Forgets all expectations, tolerances and observed diagnostics.
    #[inline]
    pub fn reset(&self) {
        self.state.lock().reset();
    }

    /// Returns the create info of a debug messenger that forwards every message to this monitor.
    ///
    /// The messenger must be destroyed before the last clone of the monitor is dropped.
    pub fn messenger_create_info(&self) -> vk::DebugUtilsMessengerCreateInfoEXT<'_> {
        vk::DebugUtilsMessengerCreateInfoEXT::default()
            .message_severity(
                Severity::ERROR | Severity::WARNING | Severity::INFO | Severity::VERBOSE,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(trampoline))
            .user_data(Arc::as_ptr(&self.state) as *mut c_void)
    }
}

impl fmt::Debug for ErrorMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();

        f.debug_struct("ErrorMonitor")
            .field("desired", &state.desired)
            .field("allowed", &state.allowed)
            .field("unexpected", &state.unexpected)
            .finish_non_exhaustive()
    }
}

impl MonitorState {
    fn reset(&mut self) {
        self.desired.clear();
        self.allowed.clear();
        self.found.clear();
        self.unexpected.clear();
        self.received.clear();
    }
}

fn report_to(
    state: &Mutex<MonitorState>,
    severity: Severity,
    message_id_name: Option<&str>,
    text: &str,
) {
    if severity.contains(Severity::ERROR) {
        log::error!("{}: {}", message_id_name.unwrap_or("<no id>"), text);
    } else if severity.contains(Severity::WARNING) {
        log::warn!("{}: {}", message_id_name.unwrap_or("<no id>"), text);
    } else if severity.contains(Severity::INFO) {
        log::info!("{}: {}", message_id_name.unwrap_or("<no id>"), text);
    } else {
        log::debug!("{}: {}", message_id_name.unwrap_or("<no id>"), text);
    }

    let message = ReceivedMessage {
        severity,
        message_id_name: message_id_name.map(str::to_owned),
        text: text.to_owned(),
    };
    let mut state = state.lock();
    state.received.push(message.clone());

    let matches = |id: &str| message.matches(id);

    if let Some(index) = state
        .desired
        .iter()
        .position(|desired| desired.severity.intersects(severity) && matches(&desired.id))
    {
        let desired = &mut state.desired[index];
        desired.remaining -= 1;
        let id = desired.id.clone();

        if desired.remaining == 0 {
            state.desired.remove(index);
        }

        state.found.push(id);
    } else if state.allowed.iter().any(|allowed| matches(allowed)) {
        // Tolerated.
    } else if severity.contains(Severity::ERROR) {
        state.unexpected.push(message);
    }
}

unsafe extern "system" fn trampoline(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    user_data: *mut c_void,
) -> vk::Bool32 {
    // Unwinding across the FFI boundary is undefined behavior.
    let _ = catch_unwind(AssertUnwindSafe(move || {
        let state = &*(user_data as *const Mutex<MonitorState>);
        let callback_data = &*callback_data;

        let message_id_name = callback_data
            .p_message_id_name
            .as_ref()
            .map(|name| CStr::from_ptr(name).to_string_lossy());
        let text = callback_data
            .p_message
            .as_ref()
            .map(|text| CStr::from_ptr(text).to_string_lossy())
            .unwrap_or_default();

        report_to(state, message_severity, message_id_name.as_deref(), &text);
    }));

    vk::FALSE
}

/// A diagnostic observed by an [`ErrorMonitor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub severity: Severity,
    pub message_id_name: Option<String>,
    pub text: String,
}

impl ReceivedMessage {
    /// Returns whether `id` appears in the id name or the text of the message.
    #[inline]
    pub fn matches(&self, id: &str) -> bool {
        self.message_id_name
            .as_deref()
            .is_some_and(|name| name.contains(id))
            || self.text.contains(id)
    }
}

/// The outcome of a failed check of an [`ErrorMonitor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MonitorReport {
    /// Desired diagnostics that were not observed (as many times as required).
    pub missing: Vec<String>,
    /// Errors that were observed without being desired or allowed.
    pub unexpected: Vec<ReceivedMessage>,
}

impl Error for MonitorReport {}

impl fmt::Display for MonitorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.missing.is_empty() {
            write!(f, "did not receive expected diagnostics: {:?}", self.missing)?;

            if !self.unexpected.is_empty() {
                write!(f, "; ")?;
            }
        }

        if !self.unexpected.is_empty() {
            write!(f, "received unexpected diagnostics:")?;

            for message in &self.unexpected {
                write!(
                    f,
                    " [{}: {}]",
                    message.message_id_name.as_deref().unwrap_or("<no id>"),
                    message.text,
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorMonitor, Severity};

    const DUPLICATE_STATE: &str = "VUID-VkPipelineDynamicStateCreateInfo-pDynamicStates-01442";
    const LINE_WIDTH: &str = "VUID-VkGraphicsPipelineCreateInfo-pDynamicStates-00749";

    #[test]
    fn desired_message_is_found() {
        let monitor = ErrorMonitor::new();
        monitor.set_desired_error(DUPLICATE_STATE);
        monitor.report(Severity::ERROR, Some(DUPLICATE_STATE), "duplicate");

        assert!(monitor.check_found().is_ok());
        monitor.verify_found();
        assert_eq!(monitor.verification_count(), 1);
        assert!(!monitor.has_desired());
    }

    #[test]
    fn missing_message_is_reported() {
        let monitor = ErrorMonitor::new();
        monitor.set_desired_error(DUPLICATE_STATE);

        let report = monitor.check_found().unwrap_err();
        assert_eq!(report.missing, [DUPLICATE_STATE]);
        assert!(report.unexpected.is_empty());

        assert_should_panic!("did not receive expected diagnostics", {
            monitor.verify_found();
        });
    }

    #[test]
    fn unexpected_error_is_reported() {
        let monitor = ErrorMonitor::new();
        monitor.set_desired_error(DUPLICATE_STATE);
        monitor.report(Severity::ERROR, Some(DUPLICATE_STATE), "duplicate");
        monitor.report(Severity::ERROR, Some(LINE_WIDTH), "line width");

        let report = monitor.check_found().unwrap_err();
        assert!(report.missing.is_empty());
        assert_eq!(report.unexpected.len(), 1);
        assert!(report.unexpected[0].matches(LINE_WIDTH));
    }

    #[test]
    fn allowed_and_warning_messages_are_tolerated() {
        let monitor = ErrorMonitor::new();
        monitor.set_allowed_failure_msg(LINE_WIDTH);
        monitor.report(Severity::ERROR, None, &format!("{} line width", LINE_WIDTH));
        monitor.report(Severity::WARNING, Some("UNASSIGNED-BestPractices"), "slow");

        assert!(monitor.check_found().is_ok());
        assert_eq!(monitor.received_messages().len(), 2);
        monitor.verify_not_found();
    }

    #[test]
    fn severity_must_intersect() {
        let monitor = ErrorMonitor::new();
        monitor.set_desired_warning(DUPLICATE_STATE);
        monitor.report(Severity::ERROR, Some(DUPLICATE_STATE), "duplicate");

        let report = monitor.check_found().unwrap_err();
        assert_eq!(report.missing, [DUPLICATE_STATE]);
        assert_eq!(report.unexpected.len(), 1);
        monitor.reset();
    }

    #[test]
    fn counted_messages() {
        let monitor = ErrorMonitor::new();
        monitor.set_desired_failure_msg_count(Severity::ERROR, DUPLICATE_STATE, 2);
        monitor.report(Severity::ERROR, Some(DUPLICATE_STATE), "duplicate");
        assert!(monitor.check_found().is_err());

        monitor.report(Severity::ERROR, Some(DUPLICATE_STATE), "duplicate");
        monitor.verify_found();
    }

    #[test]
    fn messenger_callback_reports() {
        let monitor = ErrorMonitor::new();
        monitor.set_desired_error(LINE_WIDTH);

        let create_info = monitor.messenger_create_info();
        let callback = create_info.pfn_user_callback.unwrap();
        let id = std::ffi::CString::new(LINE_WIDTH).unwrap();
        let text = std::ffi::CString::new("lineWidth is 2.0").unwrap();
        let mut data = super::vk::DebugUtilsMessengerCallbackDataEXT::default();
        data.p_message_id_name = id.as_ptr();
        data.p_message = text.as_ptr();

        let result = unsafe {
            callback(
                Severity::ERROR,
                super::vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
                &data,
                create_info.p_user_data,
            )
        };

        assert_eq!(result, super::vk::FALSE);
        monitor.verify_found();
    }
}
