//! One-shot CLI commands. Each command lives in its own submodule and
//! carries its own help page.

pub mod help;
pub mod simulate;
pub mod test_audio;
pub mod times;
