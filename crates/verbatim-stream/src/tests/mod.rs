//! Behavioural suites for the streaming core.
