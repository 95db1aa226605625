//! # 署名器テスト用モック
//!
//! `S3PresignApi` のモック。受け取った記述子を記録し、固定の結果を返す。

use std::sync::Mutex;

use http::HeaderMap;

use super::s3_compat::{S3PresignApi, SignedRequest, SigningRequest};
use super::PresignError;

/// 記述子を記録するモック署名API。
pub(crate) struct MockS3Api {
    url: String,
    /// 返す署名済みヘッダ。Noneの場合は受け取ったヘッダをそのまま返す。
    signed_headers: Option<HeaderMap>,
    error: Option<String>,
    requests: Mutex<Vec<SigningRequest>>,
}

impl MockS3Api {
    /// 指定URLを返し、ヘッダは受け取ったものを返すモック。
    pub fn returning(url: &str) -> Self {
        Self {
            url: url.to_string(),
            signed_headers: None,
            error: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 指定URLと署名済みヘッダを返すモック。
    pub fn returning_headers(url: &str, signed_headers: HeaderMap) -> Self {
        Self {
            signed_headers: Some(signed_headers),
            ..Self::returning(url)
        }
    }

    /// 常に失敗するモック。
    pub fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Self::returning("")
        }
    }

    /// 記録された記述子の一覧。
    pub fn requests(&self) -> Vec<SigningRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl S3PresignApi for MockS3Api {
    async fn presign(&self, request: SigningRequest) -> Result<SignedRequest, PresignError> {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(message) = &self.error {
            return Err(PresignError::Provider(message.clone()));
        }

        Ok(SignedRequest {
            url: self.url.clone(),
            signed_headers: self
                .signed_headers
                .clone()
                .unwrap_or(request.headers),
        })
    }
}
