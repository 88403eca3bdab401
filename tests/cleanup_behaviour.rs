//! Behavioural scenarios for fixture teardown.

#[path = "common/test_constants.rs"]
mod test_constants;

mod cleanup;
