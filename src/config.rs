use std::convert::Infallible;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::{Parser, Subcommand, ValueEnum};
use directories::ProjectDirs;

use crate::cli::*;
use crate::haar::SketchType;

static CONF_DIR: LazyLock<ConfDir> = LazyLock::new(|| {
    let path = match ProjectDirs::from("", "", "haarsearch") {
        Some(proj_dirs) => proj_dirs.config_dir().to_path_buf(),
        None => PathBuf::from(".haarsearch"),
    };
    ConfDir { path }
});

#[derive(Parser, Debug, Clone)]
pub struct SearchOptions {
    /// 显示的结果数量
    #[arg(long, value_name = "COUNT", default_value_t = 10)]
    pub count: usize,
    /// 最低相似度，范围从 0 到 1，指定后忽略 --count 并返回所有满足条件的结果
    #[arg(long, value_name = "FRACTION", value_parser = parse_fraction)]
    pub threshold: Option<f64>,
    /// 评分权重，扫描图片使用 scanned，手绘草图使用 hand-drawn
    #[arg(long, value_enum, default_value_t = SketchType::Scanned)]
    pub sketch: SketchType,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { count: 10, threshold: None, sketch: SketchType::Scanned }
    }
}

#[derive(Parser, Debug, Clone)]
#[command(name = "haarsearch", version)]
pub struct Opts {
    #[command(subcommand)]
    pub subcmd: SubCommand,
    /// haarsearch 配置文件目录
    #[arg(short, long, default_value_t = CONF_DIR.clone())]
    pub conf_dir: ConfDir,
}

#[derive(Subcommand, Debug, Clone)]
pub enum SubCommand {
    /// 计算图片签名并添加到数据库
    Add(AddCommand),
    /// 从数据库中搜索相似图片
    Search(SearchCommand),
    /// 输出图片签名的文本形式
    Signature(SignatureCommand),
    /// 在数据库中查找重复图片
    Duplicates(DuplicatesCommand),
    /// 启动 HTTP 搜索服务
    Server(ServerCommand),
}

#[derive(Debug, Clone)]
pub struct ConfDir {
    path: PathBuf,
}

impl ConfDir {
    /// 返回数据库目录的路径
    pub fn database(&self) -> PathBuf {
        self.path.join("haarsearch.mdb")
    }
}

impl FromStr for ConfDir {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self { path: PathBuf::from(s) })
    }
}

impl std::fmt::Display for ConfDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

pub(crate) fn parse_fraction(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("无效的相似度: {e}"))?;
    check_fraction(v)
}

/// 相似度必须在 0 到 1 之间，NaN 也会被拒绝
pub(crate) fn check_fraction(v: f64) -> Result<f64, String> {
    if !(0.0..=1.0).contains(&v) {
        return Err(format!("相似度必须在 0 到 1 之间: {v}"));
    }
    Ok(v)
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OutputFormat {
    Json,
    #[default]
    Table,
}
