pub mod common;
pub mod registry_tests;
pub mod activator_tests;
pub mod entry_point_tests;
