//! Status API routes

pub mod alarm;
pub mod status;
