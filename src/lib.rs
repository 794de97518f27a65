//! Workspace root package. It carries workspace-level development tooling
//! (the pre-commit hook); the code lives under `crates/`.
