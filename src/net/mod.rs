pub mod protocol;
pub mod transport;
pub mod host;
