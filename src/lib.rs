#![deny(missing_docs)]

//! Serial Expect drives embedded devices attached over serial links.
//!
//! Two engines are provided, and they do not depend on each other:
//!
//! - [`scanner::Scanner`] owns a raw byte stream (typically a firmware
//!   console on a tty) and scans it for patterns, expect-style.
//!   Every wait is bounded by a deadline.
//! - [`control::ControlChannel`] owns a helper process which in turn owns
//!   the serial device. Commands are written to the helper one at a time,
//!   and a background reader correlates each answer back to the caller
//!   waiting for it.
//!
//! A real deployment may run both at once, against different links.

/// Expect-style pattern scanning over a live byte stream.
pub mod scanner;

/// Command/answer channel to the control node helper process.
pub mod control;

/// Line framing for serial and helper process streams.
pub(crate) mod codec;

/// Relates to config files.
pub mod config;

/// The command line interface.
pub mod cli;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;
