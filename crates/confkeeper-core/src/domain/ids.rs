//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID + ジェネリック実装
//! ULID (Universally Unique Lexicographically Sortable Identifier) を使用します。
//! Phantom type パターンを使ってコードの重複を排除しています。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **分散生成可能**: 調整なしで複数ノードで生成できる

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"dev-" など）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
///
/// `T` は PhantomData で、実行時にはメモリを消費しませんが、
/// コンパイル時に型安全性を提供します。
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    /// ULID から Id を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// 新しい Id を生成
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Device のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceMarker {}

impl IdMarker for DeviceMarker {
    fn prefix() -> &'static str {
        "dev-"
    }
}

/// Identifier of a backup target device.
pub type DeviceId = Id<DeviceMarker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_ids_display_with_prefix() {
        let id = DeviceId::generate();
        assert!(id.to_string().starts_with("dev-"));
    }

    #[test]
    fn ulid_ids_are_sortable() {
        // ULID は時刻ベースなので、生成順序でソート可能
        let id1 = DeviceId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = DeviceId::generate();

        assert!(id1 < id2);
    }

    #[test]
    fn ids_can_be_serialized() {
        let id = DeviceId::generate();

        let serialized = serde_json::to_string(&id).unwrap();
        let deserialized: DeviceId = serde_json::from_str(&serialized).unwrap();

        assert_eq!(id, deserialized);
    }
}
