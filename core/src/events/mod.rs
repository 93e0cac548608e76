//! Swarm lifecycle events.
//!
//! Everything observable about a run (dispatches, retries, circuit
//! transitions, scaling requests) is published on a broadcast channel.
//! Subscribing is optional; with no receiver attached emission is a no-op.

mod bus;
mod types;

pub use bus::EventBus;
pub use types::SwarmEvent;
