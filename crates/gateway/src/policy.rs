//! # 暗号化ポリシー
//!
//! ターゲットごとの暗号化指定を検証する。
//!
//! | type | key_ref | customer_key_* |
//! |---|---|---|
//! | provider_managed | 空 | 禁止 |
//! | customer_managed | 必須 | 禁止 |
//!
//! 顧客提供鍵（SSE-C相当）はどちらの種別でも受け付けない。
//! Gatewayが生の鍵素材を扱わないための制限。

use bsync_types::{EncryptionSpec, EncryptionType};

/// 暗号化ポリシー違反。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    /// provider_managedにkey_refが指定された
    #[error("key_ref must be empty for provider_managed")]
    KeyRefNotAllowed,
    /// customer_managedにkey_refが指定されていない
    #[error("key_ref required for customer_managed")]
    KeyRefRequired,
    /// 顧客提供鍵のフィールドが指定された
    #[error("customer-supplied fields not allowed for {0}")]
    CustomerKeyNotAllowed(&'static str),
    /// 種別が未指定または未知
    #[error("unsupported encryption type")]
    UnsupportedType,
}

/// 暗号化指定をポリシーに照らして検証する。
pub fn check_encryption(spec: &EncryptionSpec) -> Result<(), PolicyViolation> {
    match &spec.encryption_type {
        Some(EncryptionType::ProviderManaged) => {
            if !spec.key_ref().is_empty() {
                return Err(PolicyViolation::KeyRefNotAllowed);
            }
            if spec.has_customer_key_material() {
                return Err(PolicyViolation::CustomerKeyNotAllowed("provider_managed"));
            }
            Ok(())
        }
        Some(EncryptionType::CustomerManaged) => {
            if spec.key_ref().is_empty() {
                return Err(PolicyViolation::KeyRefRequired);
            }
            if spec.has_customer_key_material() {
                return Err(PolicyViolation::CustomerKeyNotAllowed("customer_managed"));
            }
            Ok(())
        }
        Some(EncryptionType::Other(_)) | None => Err(PolicyViolation::UnsupportedType),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_managed() {
        assert_eq!(check_encryption(&EncryptionSpec::provider_managed()), Ok(()));

        let mut spec = EncryptionSpec::provider_managed();
        spec.key_ref = Some("alias/uploads".into());
        assert_eq!(check_encryption(&spec), Err(PolicyViolation::KeyRefNotAllowed));
        assert_eq!(
            PolicyViolation::KeyRefNotAllowed.to_string(),
            "key_ref must be empty for provider_managed"
        );

        // 空文字列のkey_refは未指定と同じ
        spec.key_ref = Some(String::new());
        assert_eq!(check_encryption(&spec), Ok(()));

        spec.customer_key_sha256_b64 = Some("c2hh".into());
        assert_eq!(
            check_encryption(&spec),
            Err(PolicyViolation::CustomerKeyNotAllowed("provider_managed"))
        );
    }

    #[test]
    fn test_customer_managed() {
        let spec = EncryptionSpec::customer_managed("arn:aws:kms:us-east-1:111122223333:key/abcd");
        assert_eq!(check_encryption(&spec), Ok(()));

        let spec = EncryptionSpec::customer_managed("");
        assert_eq!(check_encryption(&spec), Err(PolicyViolation::KeyRefRequired));
        assert_eq!(
            PolicyViolation::KeyRefRequired.to_string(),
            "key_ref required for customer_managed"
        );

        let mut spec = EncryptionSpec::customer_managed("alias/uploads");
        spec.customer_key_b64 = Some("a2V5".into());
        assert_eq!(
            check_encryption(&spec),
            Err(PolicyViolation::CustomerKeyNotAllowed("customer_managed"))
        );
    }

    #[test]
    fn test_customer_key_md5_alone_is_rejected() {
        let mut spec = EncryptionSpec::customer_managed("alias/uploads");
        spec.customer_key_md5_b64 = Some("bWQ1".into());
        assert!(check_encryption(&spec).is_err());
    }

    #[test]
    fn test_unsupported_type() {
        let spec = EncryptionSpec {
            encryption_type: Some(EncryptionType::Other("sse_c".into())),
            ..EncryptionSpec::default()
        };
        assert_eq!(check_encryption(&spec), Err(PolicyViolation::UnsupportedType));

        // typeなしの暗号化指定
        assert_eq!(
            check_encryption(&EncryptionSpec::default()),
            Err(PolicyViolation::UnsupportedType)
        );
        assert_eq!(
            PolicyViolation::UnsupportedType.to_string(),
            "unsupported encryption type"
        );
    }
}
