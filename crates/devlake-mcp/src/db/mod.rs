//! Database access: value model, backend traits, MySQL backend and the pool

mod connector;
mod mysql;
mod pool;
mod value;

pub use connector::{Connector, DbConnection, DbError, DbErrorKind, FetchedRows};
pub use mysql::MySqlConnector;
pub use pool::{
    ConnectionLease, ConnectionManager, HealthReport, LeaseState, PoolSettings, PoolStatus,
    ReconnectPolicy,
};
pub use value::{ResultSet, SqlValue};
