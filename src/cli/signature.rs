use std::path::PathBuf;

use clap::Parser;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::{HaarIface, MemoryStore, decode};

#[derive(Parser, Debug, Clone)]
pub struct SignatureCommand {
    /// 图片路径，可以指定多张
    #[arg(required = true)]
    pub images: Vec<PathBuf>,
}

impl SubCommandExtend for SignatureCommand {
    async fn run(&self, _opts: &Opts) -> anyhow::Result<()> {
        // 只计算签名，不需要打开数据库
        let mut iface = HaarIface::new(MemoryStore::new());
        for path in &self.images {
            let text = block_in_place(|| {
                let image = decode::load_file(path)?;
                iface.signature_as_text(&image)
            })?;
            if self.images.len() > 1 {
                println!("{}\t{}", text, path.display());
            } else {
                println!("{}", text);
            }
        }
        Ok(())
    }
}
