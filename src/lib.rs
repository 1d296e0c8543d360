//! Coastline thumbnails for exercise scenario folders.
//!
//! [`thumbnail`] renders single tiles; [`pipeline`] schedules them for a
//! whole folder with cancellation on navigation.

pub mod config;
pub mod data;
pub mod exercise;
pub mod fit;
pub mod geo;
pub mod map;
pub mod pipeline;
pub mod thumbnail;

pub use config::ThumbnailConfig;
pub use thumbnail::ThumbnailRenderer;
