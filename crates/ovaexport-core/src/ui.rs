//! Operator-facing message sink.

use std::cell::RefCell;

/// One-way channel for progress and diagnostic text shown to the operator.
pub trait Ui {
    fn message(&self, message: &str);
}

/// Writes each message to standard output.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleUi;

impl Ui for ConsoleUi {
    fn message(&self, message: &str) {
        println!("{}", message);
    }
}

/// Keeps every message in memory. Useful in tests and for hosts that render
/// output themselves.
#[derive(Debug, Default)]
pub struct RecordingUi {
    messages: RefCell<Vec<String>>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages received so far, oldest first.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }
}

impl Ui for RecordingUi {
    fn message(&self, message: &str) {
        self.messages.borrow_mut().push(message.to_string());
    }
}
