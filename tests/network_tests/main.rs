//! Network integration tests
