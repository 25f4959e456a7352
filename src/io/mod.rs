//! Host-facing keyboard and terminal collaborators.
//!
//! These are driver concerns, not part of the emulated core: raw-mode
//! terminal handling, a background polling thread, and a flat byte buffer
//! for data-injection files.

mod keyboard;
mod terminal;

pub use keyboard::{DataFileKeyboard, InteractiveKeyboard};
pub use terminal::StdoutTerminal;
