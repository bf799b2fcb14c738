//! End-to-end and property test suite for Playvault.
//!
//! Integration tests live under `tests/` and drive the real credential
//! store, session registry, signer and swap orchestrator against the
//! in-process collaborators in [`helpers`].

pub mod helpers;
