use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::Error;

/// API错误类型
pub struct AppError {
    error: anyhow::Error,
    status: Option<StatusCode>,
}

impl AppError {
    /// 请求参数无效
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self { error: anyhow::anyhow!(msg.into()), status: Some(StatusCode::BAD_REQUEST) }
    }

    pub(crate) fn status(&self) -> StatusCode {
        if let Some(status) = self.status {
            return status;
        }
        match self.error.downcast_ref::<Error>() {
            Some(Error::SignatureNotFound(_) | Error::ImageNotFound(_)) => StatusCode::NOT_FOUND,
            Some(
                Error::ImageDecode(_)
                | Error::CorruptSignature(_)
                | Error::UnsupportedSignatureVersion(_),
            ) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("请求处理失败: {:?}", self.error);
        }
        (status, format!("Something went wrong: {}", self.error)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self { error: err.into(), status: None }
    }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
