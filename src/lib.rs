//! Automatic timetable generation service.
//!
//! The core is a week-by-week placement engine that assigns course sessions
//! to (day, slot, teacher, room) tuples under hard constraints, with bounded
//! relocation of already-placed sessions when a slot cannot be found
//! directly. Generations run as background jobs and publish poll-able
//! progress snapshots over the web API.

pub mod app;
pub mod calendar;
pub mod cli;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod jobs;
pub mod logging;
pub mod services;
pub mod state;
pub mod utils;
pub mod web;
