//! Domain records shared by every component of the engine.
mod file;
mod subscriber;
mod watermarks;
pub use file::*;
pub use subscriber::*;
pub use watermarks::*;
