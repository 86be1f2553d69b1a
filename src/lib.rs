//! Projectionist - batch playback validation for Jellyfin movie libraries
//!
//! Walks the server's movie library in resumable batches, probes each movie
//! for playback viability, tags defective items on the server, archives them
//! to a text file, and keeps a durable checkpoint so interrupted runs pick up
//! where they stopped.

pub mod app;
pub mod archive;
pub mod batch;
pub mod checkpoint;
pub mod config;
pub mod services;
pub mod validator;
