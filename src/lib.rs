pub mod config;
pub mod error;
pub mod frame_loop;
pub mod logging;
pub mod pose;
pub mod scoring;
pub mod session;
pub mod similarity;
pub mod tracker;
