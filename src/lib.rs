//! Library exports for the CLI, benchmarks and tests.
/// Application directory layout.
pub mod app_dirs;
/// TOML settings.
pub mod config;
/// JSON payloads for map front ends.
pub mod export;
/// Best-effort geolocation.
pub mod geo;
/// Grid predictions over the sampled area.
pub mod grid;
pub(crate) mod http_client;
/// Tracing setup and log file rotation.
pub mod logging;
/// Regression algorithms.
pub mod ml;
/// Model artifacts, training and persistence.
pub mod model;
/// Facade over the whole coverage workflow.
pub mod pipeline;
/// Plain-text coverage report.
pub mod report;
/// Raw sample rows, validation and storage.
pub mod samples;
/// Wi-Fi scan acquisition and parsing.
pub mod scan;
