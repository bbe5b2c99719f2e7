pub mod blob;
pub mod cli;
pub mod config;
pub mod decode;
pub mod duplicates;
pub mod error;
pub mod haar;
pub mod iface;
mod metrics;
pub mod ranking;
mod server;
pub mod store;
pub mod utils;

/// 图片在存储中的唯一标识
pub type ImageId = i64;

pub use config::Opts;
pub use duplicates::{DUPLICATE_THRESHOLD, DuplicateGroups, DuplicateOptions};
pub use error::{Error, Result};
pub use haar::{SignatureData, SketchType};
pub use iface::{CancelToken, HaarIface, ScoreMap};
pub use ranking::Match;
pub use store::{IdentifierResolver, ImageDb, MemoryStore, SignatureReader, SignatureStore};
