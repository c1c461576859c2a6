//! Real-time pipeline components.
//!
//! Both run inside the playback callback, in this order, with the same frame
//! clock value:
//!
//! ```text
//! mic ring → Capture Path → recording ring → writer thread → Sink
//! tracks   → Mix Path     → device output buffer
//! ```
//!
//! - **Capture Path**: drains the microphone and gates samples on the
//!   recording threshold
//! - **Mix Path**: sums overlapping tracks into stereo and soft clips
//!
//! Neither path blocks or allocates.

mod capture;
mod mixer;

pub(crate) use capture::CapturePath;
pub use mixer::mix_tracks;
