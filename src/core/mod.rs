//! Governor core: configuration, rules, workers, and the composition root.

pub mod config;
pub mod enforcer;
pub mod governor;
pub mod reclaimer;
pub mod rules;
pub mod services;
mod worker;
