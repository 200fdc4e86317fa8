//! Request/acknowledgement/response engine.
//!
//! Start an [`Engine`] over any
//! [`Transport`](serialrw_transport::Transport), send typed requests, and
//! query their progress by id. Two worker threads run behind the facade:
//! a listener that frames incoming bytes and a dispatcher that matches
//! acknowledgements and responses to outstanding packets and sweeps for
//! timeouts while idle.

pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
mod listener;
pub mod table;

pub use config::EngineConfig;
pub use dispatcher::{dispatch, dispatch_at, Dispatch};
pub use engine::Engine;
pub use error::{EngineError, Result};
pub use table::{PacketTable, TABLE_SIZE};
