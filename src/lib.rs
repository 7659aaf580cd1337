// Library exports for testing
pub mod capture;
pub mod chat;
pub mod config;
pub mod constants;
pub mod gemini;
pub mod live;
pub mod media;
pub mod playback;
pub mod plugin;
pub mod splitter;
pub mod timeline;
pub mod transcript;
