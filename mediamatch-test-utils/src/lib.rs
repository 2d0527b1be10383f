//! Shared test doubles and fixtures for mediamatch crates.

pub mod fixtures;
pub mod mocks;

pub use fixtures::{episode_candidate, movie_candidate};
pub use mocks::provider::MockProvider;
