pub mod cli;
pub mod command;
pub mod config;
pub mod connection;
pub mod error;
pub mod manager;
pub mod pool;
pub mod protocol;
pub mod retry;
pub mod socket;

pub use cli::prompt;
pub use command::{Command, CommandError};
pub use config::{ManagerConfig, PoolConfig, ServerEndpoint};
pub use error::{ErrorKind, HsError, Result};
pub use manager::{Manager, Modified, NamedRow, QueryOptions};
pub use pool::ConnectionPool;
pub use protocol::{FindOp, IndexId, ModifyKind, ModifyOp};
pub use retry::retry_on_failure;
pub use socket::{ModifyResult, ReadSocket, WriteSocket};
