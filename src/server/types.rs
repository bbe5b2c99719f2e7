use axum::body::Bytes;
use axum_typed_multipart::TryFromMultipart;
use serde::Serialize;
use utoipa::ToSchema;

use crate::ImageId;

/// 搜索请求参数
#[derive(TryFromMultipart)]
pub struct SearchRequest {
    pub file: Bytes,
    pub count: Option<usize>,
    pub threshold: Option<f64>,
    pub sketch: Option<String>,
}

/// 搜索表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SearchForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
    /// 返回的结果数量
    pub count: Option<usize>,
    /// 最低相似度，范围从 0 到 1，指定后忽略 count
    pub threshold: Option<f64>,
    /// 评分权重，`scanned` 或 `hand-drawn`
    pub sketch: Option<String>,
}

/// 计算签名的请求参数
#[derive(TryFromMultipart)]
pub struct SignatureRequest {
    pub file: Bytes,
}

/// 计算签名的表单（用于API文档）
#[derive(Debug, ToSchema)]
#[allow(unused)]
pub struct SignatureForm {
    /// 上传的图片文件
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub file: String,
}

/// 一条搜索结果
#[derive(Debug, Serialize, ToSchema)]
pub struct MatchItem {
    /// 图片 ID
    pub id: ImageId,
    /// top-K 搜索时为原始分数（越低越相似），阈值搜索时为 0 到 1 之间的相似度
    pub score: f64,
    /// 图片路径
    pub path: Option<String>,
}

/// 搜索响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SearchResponse {
    /// 搜索耗时，单位为毫秒
    pub time: u64,
    pub result: Vec<MatchItem>,
}

/// 计算签名的响应
#[derive(Debug, Serialize, ToSchema)]
pub struct SignatureResponse {
    /// base64 编码的签名
    pub signature: String,
}
