pub mod chunks;
pub mod confirm;
pub mod playback;
pub mod sessions;
