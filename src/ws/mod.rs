pub mod collaborators;
pub mod connection;
pub mod hub;
pub mod message_router;

#[cfg(test)]
pub(crate) mod test_support;

pub use collaborators::{GroupMembership, MessagePersister, SessionResolver};
pub use connection::{Connection, handle_socket, run_read_loop, run_write_loop, serve_connection};
pub use hub::{Hub, SharedHub, encode_payload};
pub use message_router::{ChatRouter, MessageRouter};
