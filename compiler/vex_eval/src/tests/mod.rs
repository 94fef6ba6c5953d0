//! Scenario tests.
//!
//! Whole programs are described with the builder in `program`, loaded
//! through an in-memory module parser and run by [`crate::Instance`] with a
//! buffer print handler.


mod class_tests;
mod control_tests;
mod error_tests;
mod expression_tests;
mod template_tests;
