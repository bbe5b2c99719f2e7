use std::sync::Arc;

use crate::ImageDb;
use crate::cli::server::ServerCommand;
use crate::config::SearchOptions;

/// 应用状态
pub struct AppState {
    /// 数据库句柄，每个请求克隆一份
    pub db: ImageDb,
    /// 默认搜索参数
    pub search: SearchOptions,
}

impl AppState {
    /// 创建新的应用状态
    pub fn new(db: ImageDb, opts: &ServerCommand) -> Arc<Self> {
        Arc::new(AppState { db, search: opts.search.clone() })
    }
}
