//! End-to-end resolution in both parsing modes.

mod command_mode;
mod lifecycle;
mod map_mode;
