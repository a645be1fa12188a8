//! Listeners: the RESP command port and the web port, both answering from
//! one shared command table.

pub mod command;
pub mod http;
pub mod resp;
pub mod server;
pub mod surface;
