//! Cross-crate scenarios live under `tests/`; the shared fixture is in
//! `tests/common`.
