//! Control connection to the relay server

mod connector;
mod liveness;

pub use connector::{ActiveLink, Connector, LinkState};
pub use liveness::Liveness;
