//! ffmpeg-backed media actions: still-frame extraction and web-profile
//! transcoding.

mod frame;
mod transcode;

pub use frame::{cover_timestamp, extract_frame, frame_args, thumbnail_timestamp};
pub use transcode::{transcode_args, transcode_video, EncodeProgress, ProgressParser};
