//! Internal logging helpers for structured scan events.

/// Single logging target for the crate.
pub(crate) const LOG_TARGET: &str = "ordkey";
