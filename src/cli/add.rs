use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use clap::Parser;
use indicatif::{ParallelProgressIterator, ProgressBar};
use log::{info, warn};
use rayon::prelude::*;
use regex::Regex;
use tokio::task::block_in_place;
use walkdir::WalkDir;

use crate::cli::SubCommandExtend;
use crate::config::Opts;
use crate::utils::{has_suffix, pb_style, suffix_regex};
use crate::{HaarIface, ImageDb, decode};

#[derive(Parser, Debug, Clone)]
pub struct AddCommand {
    /// 图片所在目录，也可以是单张图片
    pub path: PathBuf,
    /// 扫描的文件后缀名，多个后缀用逗号分隔
    #[arg(short, long, default_value = "jpg,jpeg,png,webp,bmp")]
    pub suffix: String,
    /// 在添加到数据库之前使用正则表达式对图片路径进行处理
    /// 例：--replace '/path/to/image/(?<name>[0-9]+).jpg' '$name'
    #[arg(short, long, num_args = 2, value_names = ["REGEX", "REPLACE"], verbatim_doc_comment)]
    pub replace: Vec<String>,
    /// 如果图片已添加且内容未变，是否仍然重新计算签名
    #[arg(long)]
    pub overwrite: bool,
}

#[derive(Default)]
struct Stats {
    added: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
}

impl SubCommandExtend for AddCommand {
    async fn run(&self, opts: &Opts) -> anyhow::Result<()> {
        let re_suf = suffix_regex(&self.suffix)?;
        let replace = match self.replace.as_slice() {
            [] => None,
            [re, rep] => Some((Regex::new(re)?, rep.clone())),
            _ => return Err(anyhow!("--replace 需要两个参数")),
        };

        let db = ImageDb::open(opts.conf_dir.database())?;

        let entries = WalkDir::new(&self.path)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("无法读取目录项: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && has_suffix(entry.path(), &re_suf))
            .map(|entry| entry.into_path())
            .collect::<Vec<_>>();
        info!("找到 {} 张图片", entries.len());

        let pb = ProgressBar::new(entries.len() as u64).with_style(pb_style());
        let stats = Stats::default();

        block_in_place(|| {
            entries.par_iter().progress_with(pb.clone()).for_each_init(
                || HaarIface::new(db.clone()),
                |iface, path| {
                    let key = image_key(path, replace.as_ref());
                    match add_image(iface, path, &key, self.overwrite) {
                        Ok(true) => {
                            pb.set_message(format!("添加图片: {}", key));
                            stats.added.fetch_add(1, Ordering::Relaxed);
                        }
                        Ok(false) => {
                            pb.set_message(format!("跳过图片: {}", key));
                            stats.skipped.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            pb.println(format!("[ERR] {}: {}", path.display(), e));
                            stats.failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                },
            )
        });

        pb.finish_with_message("图片添加完成");
        info!(
            "添加 {} 张，跳过 {} 张，失败 {} 张",
            stats.added.into_inner(),
            stats.skipped.into_inner(),
            stats.failed.into_inner()
        );

        Ok(())
    }
}

/// 图片在数据库中的标识
fn image_key(path: &Path, replace: Option<&(Regex, String)>) -> String {
    let path = path.to_string_lossy();
    match replace {
        Some((re, rep)) => re.replace(&path, rep.as_str()).into_owned(),
        None => path.into_owned(),
    }
}

/// 添加一张图片，返回是否真正写入了数据库
fn add_image(iface: &mut HaarIface<ImageDb>, path: &Path, key: &str, overwrite: bool) -> Result<bool> {
    let bytes = fs::read(path)?;
    let hash = blake3::hash(&bytes);
    if !overwrite && iface.is_indexed(key, hash.as_bytes())? {
        return Ok(false);
    }

    let image = decode::decode_bytes(&bytes)?;
    let sig = iface.compute_signature(&image)?;
    iface.insert_signature(key, hash.as_bytes(), &sig)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_replace() {
        let re = Regex::new(r"/data/(?<name>[0-9]+)\.jpg").unwrap();
        let replace = (re, "$name".to_string());
        assert_eq!(image_key(Path::new("/data/123.jpg"), Some(&replace)), "123");
        assert_eq!(image_key(Path::new("/other/1.jpg"), Some(&replace)), "/other/1.jpg");
        assert_eq!(image_key(Path::new("/data/1.jpg"), None), "/data/1.jpg");
    }
}
