//! Helpers for the test suites: database setup, catalog seeding and a scripted vendor adapter.
pub mod mock_provider;
pub mod prepare_env;
pub mod seeds;
