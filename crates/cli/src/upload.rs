//! # upload サブコマンド
//!
//! 1. ペイロードを読み込みSHA-256を計算
//! 2. `POST /v1/put` で単一ターゲットの署名付きURLを取得
//! 3. 返却された全URLへ、返却ヘッダ + Content-Type を付けてPUT
//!
//! `--sigv4` 指定時は手順2のリクエストに `execute-api` のSigV4署名を付ける。

use std::path::PathBuf;

use bsync_types::{
    EncryptionSpec, PresignedUrl, Provider, PutObjectRequest, PutObjectResponse, TargetRef,
};
use clap::Args;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use sha2::{Digest, Sha256};

use crate::sigv4::GatewaySigner;

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// GatewayのベースURL
    #[arg(long)]
    pub api: String,
    /// アップロード先バケット
    #[arg(long)]
    pub bucket: String,
    /// オブジェクトキー
    #[arg(long)]
    pub key: String,
    /// ストレージプロバイダ（aws, azure, gcp）
    #[arg(long, default_value = "aws")]
    pub provider: Provider,
    /// customer_managed暗号化に使うKMS鍵の参照
    #[arg(long)]
    pub kms: Option<String>,
    #[arg(long, default_value = "application/json")]
    pub content_type: String,
    /// 署名付きURLの有効期間（ミリ秒）
    #[arg(long, default_value_t = 120_000)]
    pub ttl_ms: i64,
    /// アップロードするファイル
    #[arg(long)]
    pub payload: PathBuf,
    /// Gateway呼び出しに署名する際のAWSリージョン
    #[arg(long)]
    pub region: Option<String>,
    /// Gateway呼び出しにSigV4署名（execute-api）を付ける
    #[arg(long, requires = "region")]
    pub sigv4: bool,
}

/// uploadの失敗。
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("ペイロードの読み込みに失敗: {path}: {source}")]
    ReadPayload {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("HTTP通信に失敗: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Gatewayへのリクエストを構築できません: {0}")]
    BuildRequest(String),
    #[error("--sigv4 には --region が必要です")]
    MissingRegion,
    #[error("AWS認証情報が見つかりません")]
    NoCredentials,
    #[error("SigV4署名に失敗: {0}")]
    Signing(String),
    #[error("Gatewayがエラーを返しました ({status}): {body}")]
    Gateway { status: u16, body: String },
    #[error("Gatewayのレスポンスにターゲットがありません")]
    NoTargets,
    #[error("ターゲット{index}に不正なヘッダ {name:?}")]
    InvalidHeader { index: usize, name: String },
    #[error("ターゲット{index} ({bucket}/{key}) へのアップロードに失敗 ({status}): {body}")]
    Upload {
        index: usize,
        bucket: String,
        key: String,
        status: u16,
        body: String,
    },
}

/// uploadの結果。
#[derive(Debug)]
pub struct UploadReport {
    /// ペイロードのSHA-256（16進数）
    pub sha256: String,
    /// アップロード済みターゲット（Gatewayの返却順）
    pub uploaded: Vec<TargetRef>,
}

/// 引数から単一ターゲットの `PutObjectRequest` を組み立てる。
pub fn build_request(args: &UploadArgs) -> PutObjectRequest {
    let mut target = TargetRef::new(args.provider.clone(), args.bucket.clone(), args.key.clone());
    if let Some(key_ref) = &args.kms {
        target = target.with_encryption(EncryptionSpec::customer_managed(key_ref.clone()));
    }

    PutObjectRequest {
        replication_targets: vec![target],
        content_type: args.content_type.clone(),
        metadata: Default::default(),
        expires_ms: args.ttl_ms,
    }
}

pub fn sha256_hex(payload: &[u8]) -> String {
    hex::encode(Sha256::digest(payload))
}

/// Gatewayに署名付きURLを要求する。`signer` 指定時はSigV4署名を付ける。
pub async fn request_urls(
    client: &reqwest::Client,
    api: &str,
    request: &PutObjectRequest,
    signer: Option<&GatewaySigner>,
) -> Result<PutObjectResponse, UploadError> {
    let url = format!("{}/v1/put", api.trim_end_matches('/'));
    let body = serde_json::to_vec(request).map_err(|e| UploadError::BuildRequest(e.to_string()))?;
    let mut http_request = http::Request::post(url)
        .header(CONTENT_TYPE, "application/json")
        .body(body)
        .map_err(|e| UploadError::BuildRequest(e.to_string()))?;

    if let Some(signer) = signer {
        signer.sign(&mut http_request).await?;
        tracing::debug!("Gatewayへのリクエストに署名");
    }

    let resp = client
        .execute(reqwest::Request::try_from(http_request)?)
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(UploadError::Gateway {
            status: status.as_u16(),
            body,
        });
    }

    let response: PutObjectResponse = resp.json().await?;
    if response.targets.is_empty() {
        return Err(UploadError::NoTargets);
    }
    Ok(response)
}

/// 署名付きURL1件へペイロードをPUTする。
pub async fn put_payload(
    client: &reqwest::Client,
    index: usize,
    presigned: &PresignedUrl,
    content_type: &str,
    payload: Vec<u8>,
) -> Result<(), UploadError> {
    let invalid = |name: &str| UploadError::InvalidHeader {
        index,
        name: name.to_string(),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type).map_err(|_| invalid("content-type"))?,
    );
    // 署名済みヘッダは値を変えずに送る必要がある
    for (name, value) in &presigned.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid(name))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid(name))?;
        headers.insert(header_name, header_value);
    }

    let resp = client
        .put(&presigned.url)
        .headers(headers)
        .body(payload)
        .send()
        .await?;

    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(UploadError::Upload {
            index,
            bucket: presigned.target.bucket.clone(),
            key: presigned.target.key.clone(),
            status: status.as_u16(),
            body,
        });
    }
    Ok(())
}

/// uploadサブコマンド本体。
pub async fn run(args: &UploadArgs) -> Result<UploadReport, UploadError> {
    let payload = tokio::fs::read(&args.payload)
        .await
        .map_err(|source| UploadError::ReadPayload {
            path: args.payload.clone(),
            source,
        })?;
    let sha256 = sha256_hex(&payload);
    tracing::info!(bytes = payload.len(), sha256 = %sha256, "ペイロードを読み込み");

    let client = reqwest::Client::new();
    let signer = if args.sigv4 {
        let region = args.region.as_deref().ok_or(UploadError::MissingRegion)?;
        Some(GatewaySigner::new(client.clone(), region))
    } else {
        None
    };
    let response =
        request_urls(&client, &args.api, &build_request(args), signer.as_ref()).await?;

    let mut uploaded = Vec::with_capacity(response.targets.len());
    for (index, presigned) in response.targets.iter().enumerate() {
        put_payload(&client, index, presigned, &args.content_type, payload.clone()).await?;
        tracing::info!(
            index,
            provider = %presigned.target.provider,
            bucket = %presigned.target.bucket,
            "アップロード完了"
        );
        uploaded.push(presigned.target.clone());
    }

    Ok(UploadReport { sha256, uploaded })
}
