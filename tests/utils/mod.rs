pub mod run_builders;
pub mod setup;

// Re-export main utilities for use by test files
pub use run_builders::RunBuilder;
#[allow(unused_imports)]
pub use setup::{TestSetup, TestSetupBuilder, TEST_DEBOUNCE};
