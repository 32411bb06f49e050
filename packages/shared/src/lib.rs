//! Code shared between the Lobby client and the development relay server.

pub mod logger;
pub mod protocol;
