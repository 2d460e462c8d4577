// Shared helpers for the integration tests. Every per-topic file includes
// this module on its own, so not every helper is used everywhere.
#![allow(dead_code)]

pub mod field;
pub mod fixtures;

/// Route `log` output through env_logger; safe to call from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
