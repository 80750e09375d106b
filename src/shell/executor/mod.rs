mod builtins;
mod children;
mod execution;
#[allow(clippy::module_inception)]
mod executor;
mod posix;
mod stream;
#[cfg(test)]
pub(crate) mod testing;

pub use execution::{run, Outcome};
pub use executor::StreamId;
pub use posix::PosixExecutor;
