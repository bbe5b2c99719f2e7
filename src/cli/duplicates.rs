use clap::Parser;
use indicatif::ProgressBar;
use log::info;
use serde::Serialize;
use tokio::task::block_in_place;

use crate::cli::SubCommandExtend;
use crate::config::{Opts, OutputFormat, parse_fraction};
use crate::haar::SketchType;
use crate::store::IdentifierResolver;
use crate::utils::pb_style;
use crate::{DUPLICATE_THRESHOLD, DuplicateOptions, HaarIface, ImageDb, ImageId};

#[derive(Parser, Debug, Clone)]
pub struct DuplicatesCommand {
    /// 只在这些图片中查找，默认为数据库中的所有图片
    #[arg(long = "id", value_name = "ID")]
    pub ids: Vec<ImageId>,
    /// 判定为重复的最低相似度，范围从 0 到 1
    #[arg(long, value_name = "FRACTION", default_value_t = DUPLICATE_THRESHOLD, value_parser = parse_fraction)]
    pub threshold: f64,
    /// 评分权重
    #[arg(long, value_enum, default_value_t = SketchType::Scanned)]
    pub sketch: SketchType,
    /// 输出格式
    #[arg(long, value_enum, value_name = "FORMAT", default_value_t = OutputFormat::Table)]
    pub output_format: OutputFormat,
}

#[derive(Serialize, Debug)]
struct Group {
    id: ImageId,
    path: Option<String>,
    duplicates: Vec<(ImageId, Option<String>)>,
}

impl SubCommandExtend for DuplicatesCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let db = ImageDb::open(opts.conf_dir.database())?;
        let ids = if self.ids.is_empty() { db.image_ids()? } else { self.ids.clone() };
        let iface = HaarIface::new(db);

        let pb = ProgressBar::new(ids.len() as u64).with_style(pb_style());
        let options = DuplicateOptions { threshold: self.threshold, sketch: self.sketch };
        let groups = block_in_place(|| iface.find_duplicates_with(&ids, options, |_| pb.inc(1)))?;
        pb.finish_with_message("查找完成");
        info!("找到 {} 组重复图片", groups.len());

        let store = iface.store();
        let path_of = |id| -> anyhow::Result<Option<String>> { Ok(store.record(id)?.map(|r| r.path)) };

        // 按代表图片的 ID 排序输出
        let mut groups = groups.into_iter().collect::<Vec<_>>();
        groups.sort_by_key(|(id, _)| *id);
        let groups = groups
            .into_iter()
            .map(|(id, list)| {
                let duplicates = list
                    .into_iter()
                    .filter(|&x| x != id)
                    .map(|x| Ok((x, path_of(x)?)))
                    .collect::<anyhow::Result<Vec<_>>>()?;
                Ok(Group { id, path: path_of(id)?, duplicates })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        match self.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&groups)?),
            OutputFormat::Table => {
                for group in &groups {
                    println!("{}\t{}", group.id, group.path.as_deref().unwrap_or("-"));
                    for (id, path) in &group.duplicates {
                        println!("  {}\t{}", id, path.as_deref().unwrap_or("-"));
                    }
                }
            }
        }

        Ok(())
    }
}
