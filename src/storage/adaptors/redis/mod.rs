mod keyspace_connection;
mod redis_store;

pub use keyspace_connection::*;
pub use redis_store::*;
