//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a slice of the link
//! against a mock radio. All tests run on the host with no radio or
//! serial hardware required.

mod delivery_tests;
mod link_tests;
mod mock_radio;
