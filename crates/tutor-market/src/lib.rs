//! Teacher application intake, staff review, and parent lead capture for the
//! tutor marketplace.

pub mod config;
pub mod error;
pub mod security;
pub mod telemetry;
pub mod workflows;
