//! ## mqwire-core
//!
//! Wire-protocol core for a JMS-compatible message-queue client.
//!
//! This crate covers everything below the session/connection API: the
//! typed value space and serialized property map that carry message
//! properties and headers over the wire, the framed packet format
//! exchanged with a broker, the text-based port mapper protocol used to
//! discover a broker's service ports, and the blocking TCP/TLS
//! transports those bytes travel over.
//!
//! Building a session or connection layer on top means driving a
//! [`transport::Transport`] with [`packet::Packet::to_bytes`] /
//! [`packet::Packet::read_from`], having resolved the broker's ports
//! up front with [`portmapper::PortMapperTable::parse`].

pub mod codec;
pub mod config;
pub mod error;
pub mod io;
pub mod net;
pub mod packet;
pub mod portmapper;
pub mod property_map;
pub mod transport;
pub mod value;

pub use config::Config;
pub use error::{Error, ErrorTrace, Result};
pub use packet::Packet;
pub use property_map::PropertyMap;
pub use value::TypedValue;
