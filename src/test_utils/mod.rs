mod fixtures;
mod harness;
mod recording;
pub(crate) use fixtures::*;
pub(crate) use harness::*;
pub(crate) use recording::*;
