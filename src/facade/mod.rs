//! Thin, representative per-service operations demonstrating the pipeline's plug
//! contract (spec section 2 item 8). Full per-service coverage is explicitly out of
//! scope (spec section 1's Non-goals) — these exist to prove `client::Client::execute`
//! composes correctly end to end, not to be a complete SDK surface.

pub mod blob;
pub mod queue;
pub mod table;
