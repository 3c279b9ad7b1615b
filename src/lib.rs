//! adcast: ad-slot scheduling for broadcast programs and video thumbnails.

pub mod api;
pub mod config;
pub mod core;
pub mod media;
pub mod schedule;
pub mod thumbnail;
