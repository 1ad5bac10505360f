//! Test-only crate. The tests live in `tests/` and share `tests/helpers`.
