//! Serve entity queries from a relational database: load the configuration, set up
//! the connection pool and run queries end to end.

pub mod connector;
pub mod query;
pub mod state;
