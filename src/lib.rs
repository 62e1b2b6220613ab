pub mod clients;
pub mod codec;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod utils;

pub use clients::provider::Provider;
pub use dispatcher::Dispatcher;
pub use error::{CodecError, DispatchError};
pub use models::{
    flush_result::{FailedMessage, FlushResult, NewTokenMessage},
    message::{Alert, Handle, Message},
    status::ErrorKind,
};
