//! # リクエスト検証
//!
//! 署名器を呼び出す前に、リクエスト全体を一括で検証する。
//! 最初に見つかった違反で即座に失敗する。検査順は固定:
//!
//! 1. content_type
//! 2. メタデータ件数
//! 3. メタデータ各エントリ（キー昇順。キー長 → キー文字種 → キー重複 → 値長 → 値文字種）
//! 4. メタデータ合計サイズ
//! 5. expires_ms
//! 6. ターゲット（入力順。バケット → キー → 暗号化ポリシー）

use std::collections::HashSet;
use std::time::Duration;

use bsync_types::{GetObjectRequest, PutObjectRequest, TargetRef};

use crate::policy::{check_encryption, PolicyViolation};

/// 受け付けるContent-Type
pub const ALLOWED_CONTENT_TYPES: [&str; 5] = [
    "application/octet-stream",
    "application/json",
    "text/plain",
    "image/png",
    "image/jpeg",
];

/// メタデータの最大件数
pub const MAX_METADATA_ENTRIES: usize = 20;
/// メタデータキーの最大文字数
pub const MAX_METADATA_KEY_CHARS: usize = 128;
/// メタデータ値の最大バイト数
pub const MAX_METADATA_VALUE_BYTES: usize = 1024;
/// メタデータ全体（キー+値）の最大バイト数
pub const MAX_METADATA_TOTAL_BYTES: usize = 2048;

/// expires_msの下限（1分、含む）
pub const MIN_EXPIRES_MS: i64 = 60 * 1000;
/// expires_msの上限（10分、含む）
pub const MAX_EXPIRES_MS: i64 = 10 * 60 * 1000;

/// バケット名の最大文字数
pub const MAX_BUCKET_CHARS: usize = 63;
/// オブジェクトキーの最大文字数
pub const MAX_KEY_CHARS: usize = 1024;

/// リクエスト検証エラー。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("unsupported content type {0:?}")]
    UnsupportedContentType(String),
    #[error("too many metadata entries: {0} (max {max})", max = MAX_METADATA_ENTRIES)]
    TooManyMetadataEntries(usize),
    #[error(
        "invalid metadata key {0:?}: must be 1-{max} characters",
        max = MAX_METADATA_KEY_CHARS
    )]
    InvalidMetadataKey(String),
    #[error("invalid metadata key {0:?}: must be an HTTP header token")]
    MetadataKeyNotToken(String),
    #[error("duplicate metadata key {0:?}: keys are case-insensitive")]
    DuplicateMetadataKey(String),
    #[error(
        "metadata value too long for key {key:?}: {len} bytes (max {max})",
        max = MAX_METADATA_VALUE_BYTES
    )]
    MetadataValueTooLong { key: String, len: usize },
    #[error("invalid metadata value for key {0:?}: only visible ASCII characters are allowed")]
    InvalidMetadataValue(String),
    #[error(
        "metadata too large: {0} bytes exceeds max size of {max}",
        max = MAX_METADATA_TOTAL_BYTES
    )]
    MetadataTooLarge(usize),
    #[error("expires_ms too small: {0} (min {min} ms)", min = MIN_EXPIRES_MS)]
    ExpiresTooSmall(i64),
    #[error("expires_ms too large: {0} (max {max} ms)", max = MAX_EXPIRES_MS)]
    ExpiresTooLarge(i64),
    #[error(
        "target {index}: invalid bucket name {bucket:?}: must be 1-{max} characters",
        max = MAX_BUCKET_CHARS
    )]
    InvalidBucket { index: usize, bucket: String },
    #[error(
        "target {index}: invalid key of {chars} characters: must be 1-{max} characters",
        max = MAX_KEY_CHARS
    )]
    InvalidKey { index: usize, chars: usize },
    #[error("target {index}: {source}")]
    Encryption {
        index: usize,
        source: PolicyViolation,
    },
}

/// `PutObjectRequest` を検証する。
pub fn validate_put_request(request: &PutObjectRequest) -> Result<(), ValidationError> {
    validate_content_type(&request.content_type)?;
    validate_metadata(request)?;
    validate_expires(request.expires_ms)?;

    for (index, target) in request.replication_targets.iter().enumerate() {
        validate_target(index, target)?;
    }

    Ok(())
}

/// `GetObjectRequest` を検証する。expires_msは指定された場合のみ検査する。
pub fn validate_get_request(request: &GetObjectRequest) -> Result<(), ValidationError> {
    if let Some(expires_ms) = request.expires_ms {
        validate_expires(expires_ms)?;
    }
    validate_target(0, &request.target)
}

/// 検証済みのexpires_msをDurationに変換する。
pub fn ttl_from_millis(expires_ms: i64) -> Duration {
    Duration::from_millis(expires_ms.unsigned_abs())
}

fn validate_content_type(content_type: &str) -> Result<(), ValidationError> {
    if content_type.is_empty() || !ALLOWED_CONTENT_TYPES.contains(&content_type) {
        return Err(ValidationError::UnsupportedContentType(
            content_type.to_string(),
        ));
    }
    Ok(())
}

fn validate_metadata(request: &PutObjectRequest) -> Result<(), ValidationError> {
    let metadata = &request.metadata;
    if metadata.len() > MAX_METADATA_ENTRIES {
        return Err(ValidationError::TooManyMetadataEntries(metadata.len()));
    }

    // キーはヘッダ名（x-amz-meta-* 等）になるため大文字小文字を区別しない
    let mut seen = HashSet::with_capacity(metadata.len());
    let mut total = 0;
    for (key, value) in metadata {
        let key_chars = key.chars().count();
        if key_chars == 0 || key_chars > MAX_METADATA_KEY_CHARS {
            return Err(ValidationError::InvalidMetadataKey(key.clone()));
        }
        if !key.bytes().all(is_token_byte) {
            return Err(ValidationError::MetadataKeyNotToken(key.clone()));
        }
        if !seen.insert(key.to_ascii_lowercase()) {
            return Err(ValidationError::DuplicateMetadataKey(key.clone()));
        }
        if value.len() > MAX_METADATA_VALUE_BYTES {
            return Err(ValidationError::MetadataValueTooLong {
                key: key.clone(),
                len: value.len(),
            });
        }
        if !value.bytes().all(is_header_value_byte) {
            return Err(ValidationError::InvalidMetadataValue(key.clone()));
        }
        total += key.len() + value.len();
    }

    if total > MAX_METADATA_TOTAL_BYTES {
        return Err(ValidationError::MetadataTooLarge(total));
    }
    Ok(())
}

/// RFC 7230 の tchar
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// 可視ASCII（空白を含む）とタブ
fn is_header_value_byte(b: u8) -> bool {
    b == b'\t' || (0x20..0x7f).contains(&b)
}

fn validate_expires(expires_ms: i64) -> Result<(), ValidationError> {
    if expires_ms < MIN_EXPIRES_MS {
        return Err(ValidationError::ExpiresTooSmall(expires_ms));
    }
    if expires_ms > MAX_EXPIRES_MS {
        return Err(ValidationError::ExpiresTooLarge(expires_ms));
    }
    Ok(())
}

fn validate_target(index: usize, target: &TargetRef) -> Result<(), ValidationError> {
    let bucket_chars = target.bucket.chars().count();
    if bucket_chars == 0 || bucket_chars > MAX_BUCKET_CHARS {
        return Err(ValidationError::InvalidBucket {
            index,
            bucket: target.bucket.clone(),
        });
    }

    let key_chars = target.key.chars().count();
    if key_chars == 0 || key_chars > MAX_KEY_CHARS {
        return Err(ValidationError::InvalidKey {
            index,
            chars: key_chars,
        });
    }

    if let Some(encryption) = &target.encryption {
        check_encryption(encryption)
            .map_err(|source| ValidationError::Encryption { index, source })?;
    }

    Ok(())
}
