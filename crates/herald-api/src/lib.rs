pub mod error;
pub mod extractors;
pub mod middleware;
pub mod notifications;
pub mod producers;
pub mod read_state;
pub mod reader;
pub mod routes;
pub mod state;
pub mod writer;
