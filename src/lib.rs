//! Course recommendation service for the online learning platform
//!
//! Scores and ranks courses for a student by blending collaborative signals
//! (enrollments and likes) with content similarity of course descriptions.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
