//! Capture loops
//!
//! One dedicated worker per hardware source. Device reads are blocking calls,
//! so both loops run as OS threads rather than tasks.

pub mod audio;
pub mod video;

pub use audio::AudioWorker;
pub use video::{spawn_video_loop, VideoFrame, VideoSettings};
