// HTTP surface of a ledger node

pub mod handlers;
pub mod routes;

pub use routes::configure_routes;
