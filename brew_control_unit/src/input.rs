//! User input shared with interrupt handlers.

pub mod encoder;
