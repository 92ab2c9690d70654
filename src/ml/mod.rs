//! Regression models for signal-strength surfaces.
//!
//! Both learners are dependency-light, deterministic for a fixed seed and
//! serialize to JSON so trained artifacts can be persisted and reloaded.

pub mod forest;
pub mod mlp;
