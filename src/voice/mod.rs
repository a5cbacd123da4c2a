//! Microphone capture and speech playback

mod encode;
mod playback;
mod recorder;

pub use encode::*;
pub use playback::*;
pub use recorder::*;
