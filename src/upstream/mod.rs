//! Upstream issuer boundary: endpoint shapes, transport and response parsing.

pub mod client;
pub mod endpoints;
pub mod response;
