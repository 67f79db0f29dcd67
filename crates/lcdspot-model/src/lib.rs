pub mod config;
pub mod display;
pub mod frame;
pub mod platform;
pub mod playback;
