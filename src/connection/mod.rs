// Live-update connection: transport seam, backoff, timers and lifecycle manager

mod backoff;
mod manager;
mod timer;
mod transport;

pub use backoff::ReconnectPolicy;
pub use manager::{ConnectionManager, ConnectionState};
pub use timer::TimerHandle;
pub use transport::{
    Connector, Transport, TransportError, TransportEvent, TungsteniteConnector, CLOSE_ABNORMAL,
    CLOSE_HEARTBEAT_TIMEOUT, CLOSE_NORMAL,
};
