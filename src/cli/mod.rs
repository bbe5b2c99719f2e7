mod add;
mod duplicates;
mod search;
pub mod server;
mod signature;

pub use add::*;
pub use duplicates::*;
pub use search::*;
pub use server::*;
pub use signature::*;

use crate::config::Opts;

pub trait SubCommandExtend {
    fn run(&self, opts: &Opts) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}
