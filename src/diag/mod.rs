//! Diagnostics channel for coding errors and warnings.
//!
//! Contract violations (null owner, invalid path, permission denied, malformed
//! plugin metadata) are not recoverable errors the caller must handle; they
//! are reported here and the offending call returns a null/false/empty result.
//! Errors are forwarded to the `log` facade and recorded in a thread-local
//! list so tests can assert on emission.

use std::cell::RefCell;

thread_local! {
    static POSTED_ERRORS: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Reports a coding error: a programmer/contract violation.
pub fn post_coding_error(message: impl Into<String>) {
    let message = message.into();
    log::error!("coding error: {}", message);
    POSTED_ERRORS.with(|errors| errors.borrow_mut().push(message));
}

/// Reports a non-fatal warning. Processing continues with a defined fallback.
pub fn post_warning(message: impl Into<String>) {
    let message = message.into();
    log::warn!("{}", message);
}

/// Reports a coding error with format arguments.
#[macro_export]
macro_rules! coding_error {
    ($($arg:tt)*) => {
        $crate::diag::post_coding_error(format!($($arg)*))
    };
}

/// ErrorMark captures the diagnostic position at construction time so the
/// errors posted afterwards on this thread can be inspected.
#[derive(Debug)]
pub struct ErrorMark {
    start: usize,
}

impl ErrorMark {
    /// Sets a mark at the current position.
    pub fn new() -> Self {
        ErrorMark {
            start: POSTED_ERRORS.with(|errors| errors.borrow().len()),
        }
    }

    /// Returns true if no errors were posted since the mark was set.
    pub fn is_clean(&self) -> bool {
        self.count() == 0
    }

    /// Returns the number of errors posted since the mark was set.
    pub fn count(&self) -> usize {
        POSTED_ERRORS.with(|errors| errors.borrow().len().saturating_sub(self.start))
    }

    /// Returns the error messages posted since the mark was set.
    pub fn errors(&self) -> Vec<String> {
        POSTED_ERRORS.with(|errors| errors.borrow()[self.start..].to_vec())
    }
}

impl Default for ErrorMark {
    fn default() -> Self {
        ErrorMark::new()
    }
}
