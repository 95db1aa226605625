//! # POST /v1/put
//!
//! 複数ターゲットへのアップロード用署名付きURL発行。
//!
//! 処理の流れ: デコード → 検証 → ターゲットごとに署名器を引いて署名 → 集約。
//! いずれかの段階で失敗した時点で打ち切り、部分的な結果は返さない。

mod handler;


pub use handler::{handle_put_object, presign_put_object};
