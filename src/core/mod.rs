//! Core data model: identity keys, cron evaluation, job and trigger types.

pub mod cron;
pub mod job;
pub mod types;
