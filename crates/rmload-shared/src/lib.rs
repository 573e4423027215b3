//! # rmload-shared
//!
//! Types shared by the rmload crates: the record model and its decoder, the
//! per-object error taxonomy, and the [`ObjectStore`] / [`DocumentSink`]
//! traits the pipeline is written against.

pub mod boundary;
pub mod constants;
pub mod decode;
pub mod error;
pub mod model;
pub mod nullable;
pub mod types;

pub use boundary::{DocumentSink, ObjectStore};
pub use decode::decode;
pub use error::IngestError;
pub use model::{Envelope, IssueData, MessageData, Payload, UserData};
pub use types::{Category, DocumentPath, UnknownCategory};
