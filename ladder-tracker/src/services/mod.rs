//! External service clients

pub mod ladder_client;

pub use ladder_client::PoeLadderClient;
