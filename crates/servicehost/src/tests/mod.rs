//! Crate-level unit and behaviour tests.

#[cfg(unix)]
mod lifecycle_behaviour;
mod poller_unit;
mod support;
mod verb_matrix;
