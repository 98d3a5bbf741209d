//! Address types shared by packets and the port-mapper protocol.

pub mod ip_address;
pub mod sys_message_id;
