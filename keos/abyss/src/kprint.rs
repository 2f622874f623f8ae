//! Kernel print utilities.
//!
//! The macros keep the KeOS spelling (`info!`, `warning!`, `debug!`) but hand
//! the formatted message to the [`log`] facade instead of a serial port. The
//! binary that links the kernel installs the logger.

/// Display an information message.
///
/// Use the format! syntax to write data to the kernel log.
#[macro_export]
macro_rules! info {
    () => ($crate::__log::info!(target: "keos", ""));
    ($($arg:tt)*) => ($crate::__log::info!(target: "keos", $($arg)*));
}

/// Display a warning message.
///
/// Use the format! syntax to write data to the kernel log.
#[macro_export]
macro_rules! warning {
    () => ($crate::__log::warn!(target: "keos", ""));
    ($($arg:tt)*) => ($crate::__log::warn!(target: "keos", $($arg)*));
}

/// Display a debug message.
///
/// Use the format! syntax to write data to the kernel log.
#[macro_export]
macro_rules! debug {
    () => ($crate::__log::debug!(target: "keos", ""));
    ($($arg:tt)*) => ($crate::__log::debug!(target: "keos", $($arg)*));
}
