//! State machine module root.

pub mod machine;
pub mod timers;
