pub mod connection;
pub mod fixtures;
pub mod gateway;
pub mod migrations;

pub use connection::{connect, connect_with_settings, ConnectionSpec, DbPool};
pub use fixtures::{FacilitySeed, SeedResult, VerificationResult};
pub use gateway::{
    connect_gateway, Dialect, GatewayError, MssqlGateway, ResultSet, SqlGateway, SqliteGateway,
};
