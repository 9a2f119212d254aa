//! Public entry point: assemble the engine with [`EngineBuilder`], then drive
//! it through [`SubscriptionEngine`].
mod builder;
mod engine;
pub use builder::*;
pub use engine::*;
