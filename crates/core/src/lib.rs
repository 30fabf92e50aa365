//! Real-time dynamics, tape delay and morphing compression

pub mod domain;

pub use domain::*;
