//! User-facing reporting.
//!
//! The core never prints directly. Everything a user should see goes
//! through the [`Ui`] capability, and errors that have been shown are
//! returned as the [`Error::AlreadyReported`] sentinel so upper layers can
//! propagate them without printing twice.

use std::sync::Mutex;

use crate::error::Error;

/// Reporting capability handed to every operation that can talk to the user.
pub trait Ui {
    /// Report an error and return the already-reported sentinel, so call
    /// sites can write `return Err(ui.report_error(...))`.
    fn report_error(&self, message: &str) -> Error;

    fn report_warning(&self, message: &str);

    fn report_info(&self, message: &str);
}

/// Plain formatter UI: errors and warnings to stderr, info to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct FmtUi;

impl Ui for FmtUi {
    fn report_error(&self, message: &str) -> Error {
        eprintln!("Error: {message}");
        Error::AlreadyReported
    }

    fn report_warning(&self, message: &str) {
        eprintln!("Warning: {message}");
    }

    fn report_info(&self, message: &str) {
        println!("{message}");
    }
}

/// UI that records every message. Used by tests and by embedders that want
/// to present output themselves.
#[derive(Debug, Default)]
pub struct RecordingUi {
    messages: Mutex<Vec<String>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages reported so far, in order, with `Error:`/`Warning:`/
    /// `Info:` prefixes.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    fn push(&self, message: String) {
        self.messages.lock().unwrap().push(message);
    }
}

impl Ui for RecordingUi {
    fn report_error(&self, message: &str) -> Error {
        self.push(format!("Error: {message}"));
        Error::AlreadyReported
    }

    fn report_warning(&self, message: &str) {
        self.push(format!("Warning: {message}"));
    }

    fn report_info(&self, message: &str) {
        self.push(format!("Info: {message}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_ui_keeps_order() {
        let ui = RecordingUi::new();
        ui.report_warning("first");
        let err = ui.report_error("second");
        ui.report_info("third");

        assert!(err.is_already_reported());
        assert_eq!(
            ui.messages(),
            vec!["Warning: first", "Error: second", "Info: third"]
        );
    }
}
