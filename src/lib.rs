pub mod config;
pub mod forum;
pub mod pipeline;
pub mod progress;
pub mod providers;
pub mod quality;
pub mod textutil;
pub mod viewer;
