//! HandlerSocket wire protocol.
//!
//! Requests and responses are single lines of tab separated tokens terminated by
//! a line feed. There is no length prefix and no pipelining: a connection carries
//! exactly one outstanding request at a time.
//!
//! # Requests
//!
//! - Open index: `P <id> <db> <table> <index_name> <field,field,...>`
//! - Find: `<id> <op> <N> <col_1..col_N> <limit> <offset>`
//! - Modify: a find followed by `<modify_op> <value_1..value_M>`
//! - Insert: `<id> + <N> <col_1..col_N>`
//!
//! # Responses
//!
//! `<status> <N> <field...>`, where a zero status is success and the fields fill
//! rows of `N` columns. A failed request carries its error text as the third token.
//!
//! # Key Components
//!
//! - [`codec`]: value escaping and request framing.
//! - [`Request`]: validated request kinds and their wire tokens.
//! - [`Response`]: response line parsing.
//! - [`Transport`]: the stream socket a connection talks over.
pub mod codec;
mod request;
mod response;
mod transport;

pub(crate) const TOKEN_SEPARATOR: u8 = b'\t';
pub(crate) const LINE_END: u8 = b'\n';

pub(crate) use request::check_columns;
pub use request::{FindOp, IndexId, ModifyKind, ModifyOp, Request};
pub use response::{Response, Row};
pub use transport::{Transport, TransportError, read_line};
