//! The delivery pipeline: scheduler, resolver, filter, dispatcher, worker
//! pools and the bookkeeping they share.
mod context;
mod dispatcher;
mod filter;
mod queue;
mod refcount;
mod registry;
mod resolver;
mod scheduler;
mod trigger;
mod worker;

pub use context::*;
pub use dispatcher::*;
pub use filter::*;
pub use queue::*;
pub use refcount::*;
pub use registry::*;
pub use resolver::*;
pub use scheduler::*;
pub use trigger::*;
pub(crate) use worker::*;

#[cfg(test)]
mod filter_test;
#[cfg(test)]
mod trigger_test;
