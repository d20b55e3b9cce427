pub mod broadcaster;
pub mod connection;
pub mod handler;
pub mod messages;
pub mod registry;
pub mod session;

pub use broadcaster::{Broadcaster, DeliveryReport};
pub use connection::{Connection, ConnectionId, Outbox};
pub use handler::{websocket_handler, ChatState};
pub use messages::{InboundEvent, OutboundEvent};
pub use registry::{ConnectionRegistry, Participant};
pub use session::{Session, SessionState};
