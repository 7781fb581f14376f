// Domain model: records, deltas and validation
pub mod event;

// Wire frame decoding/encoding
pub mod codec;

// Typed event bus for subscribers
pub mod bus;

// Per-domain record collections
pub mod store;

// Routing of live deltas into the store
pub mod dispatch;

// Live WebSocket connection with heartbeat and reconnect
pub mod connection;

// REST bulk fetch for resync
pub mod api;

// Persisted store snapshots
pub mod snapshot;

// Signed-in user state
pub mod session;

// Facade wiring everything together
pub mod client;

// TOML + env configuration
pub mod config;

mod error;

pub use client::LiveClient;
pub use error::ClientError;
