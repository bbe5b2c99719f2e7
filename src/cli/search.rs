use anyhow::Result;
use clap::{ArgGroup, Parser};
use log::debug;
use serde::Serialize;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat, SearchOptions};
use crate::store::IdentifierResolver;
use crate::{HaarIface, ImageDb, ImageId, Match};

#[derive(Parser, Debug, Clone)]
#[command(group(ArgGroup::new("query").required(true).args(["image", "id", "signature"])))]
pub struct SearchCommand {
    #[command(flatten)]
    pub search: SearchOptions,
    /// 被搜索的图片路径
    pub image: Option<String>,
    /// 使用数据库中已有图片的 ID 进行搜索
    #[arg(long, value_name = "ID")]
    pub id: Option<ImageId>,
    /// 使用 signature 子命令输出的签名文本进行搜索
    #[arg(long, value_name = "TEXT")]
    pub signature: Option<String>,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

/// 带有图片路径的搜索结果
#[derive(Serialize, Debug)]
pub struct SearchResult {
    pub id: ImageId,
    pub score: f64,
    pub path: Option<String>,
}

impl SubCommandExtend for SearchCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = ImageDb::open(opts.conf_dir.database())?;
        let mut iface = HaarIface::new(db);
        let result = block_in_place(|| self.search(&mut iface))?;
        debug!("找到 {} 个结果", result.len());

        let result = with_paths(iface.store(), result)?;
        print_result(&result, self.output_format)
    }
}

impl SearchCommand {
    fn search(&self, iface: &mut HaarIface<ImageDb>) -> crate::Result<Vec<Match>> {
        let SearchOptions { count, threshold, sketch } = self.search;
        match (&self.image, self.id, &self.signature, threshold) {
            (Some(image), _, _, None) => iface.best_matches_for_file(image, count, sketch),
            (Some(image), _, _, Some(t)) => iface.best_matches_for_file_with_threshold(image, t, sketch),
            (_, Some(id), _, None) => iface.best_matches_for_image_id(id, count, sketch),
            (_, Some(id), _, Some(t)) => iface.best_matches_for_image_id_with_threshold(id, t, sketch),
            (_, _, Some(text), None) => iface.best_matches_for_signature(text, count, sketch),
            (_, _, Some(text), Some(t)) => iface.best_matches_for_signature_with_threshold(text, t, sketch),
            (None, None, None, _) => Ok(vec![]),
        }
    }
}

pub(crate) fn with_paths(store: &impl IdentifierResolver, result: Vec<Match>) -> Result<Vec<SearchResult>> {
    result
        .into_iter()
        .map(|m| {
            let path = store.record(m.id)?.map(|record| record.path);
            Ok(SearchResult { id: m.id, score: m.score, path })
        })
        .collect()
}

fn print_result(result: &[SearchResult], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?)
        }
        OutputFormat::Table => {
            for r in result {
                println!("{:.4}\t{}\t{}", r.score, r.id, r.path.as_deref().unwrap_or("-"));
            }
        }
    }
    Ok(())
}
