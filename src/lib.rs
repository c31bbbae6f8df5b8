//! Stochastic agent-based simulation of epidemic spread.
//!
//! Agents move in the unit square and are susceptible, infected,
//! recovered or vaccinated. Infection spreads by proximity, timers drive
//! recovery and loss of immunity, and two policies react to the infected
//! fraction: a quarantine that slows movement and a vaccination rollout.
//! [`engine::Population`] advances the whole system one tick at a time.

pub mod analysis;
pub mod config;
pub mod engine;
pub mod infection;
pub mod manager;
pub mod model;
pub mod motion;
pub mod policy;
pub mod stats;
pub mod transition;
