use std::path::Path;

use indicatif::ProgressStyle;
use regex::Regex;

/// 进度条样式
pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .expect("进度条模板无效")
        .progress_chars("#>-")
}

/// 由逗号分隔的后缀名列表构造匹配文件扩展名的正则，不区分大小写
pub fn suffix_regex(suffix: &str) -> Result<Regex, regex::Error> {
    let alternatives = suffix
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?i)^({alternatives})$"))
}

/// 文件扩展名是否匹配
pub fn has_suffix(path: &Path, re: &Regex) -> bool {
    path.extension().is_some_and(|ext| re.is_match(&ext.to_string_lossy()))
}
