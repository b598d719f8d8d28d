//! Post-processing: effects, the stacks that order them, and the buffers
//! they read and write.

pub mod effect;
pub mod stack;
pub mod targets;
