#![allow(dead_code)]

use dotide_sdk::{Config, Connection};

/// Connection against a mock server, with no environment influence
pub fn connection(server: &mockito::Server, config: Config) -> Connection {
    let config = config.with_api_endpoint(format!("{}/v1", server.url()));
    Connection::new(config).expect("connection")
}

/// Token-authenticated configuration with the `db` database selected
pub fn token_config() -> Config {
    Config::defaults_from(|_| None)
        .with_access_token("token")
        .with_database("db")
}

/// Basic-authenticated configuration with the `db` database selected
pub fn basic_config() -> Config {
    Config::defaults_from(|_| None)
        .with_basic_auth("id", "secret")
        .with_database("db")
}
