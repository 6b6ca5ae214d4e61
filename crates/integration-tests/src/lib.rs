//! End-to-end tests for the relay gateway live in `tests/`
