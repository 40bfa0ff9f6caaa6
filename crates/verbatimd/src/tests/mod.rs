//! Test suites for the Verbatim daemon.

pub(crate) mod support;
