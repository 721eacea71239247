//! Transactions over generators.
//!
//! [`TransactionGen`] wraps any generator, a live mount tree included, and
//! buffers writes in a change tree until they are committed or refreshed
//! away. Observers of the transaction see deltas for the as-if-committed
//! view; inner deltas that the pending changes mask are not forwarded.

mod change;
mod generator;

pub use generator::TransactionGen;
