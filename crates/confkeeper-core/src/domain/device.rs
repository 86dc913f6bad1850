//! Device - バックアップ対象のリモートデバイス
//!
//! Device は外部のデバイスレジストリが管理するもので、
//! コアからは読み取り専用として扱います。

use serde::{Deserialize, Serialize};

use super::DeviceId;

/// デバイスへ接続するためのクレデンシャル参照
///
/// `secret_ref` は平文パスワードではなく、外部のシークレットストアへの
/// 参照キーです。実際の解決は DeviceGateway 実装側の責務です。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub secret_ref: String,
}

/// Device はバックアップ対象の 1 台
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub credentials: Option<Credentials>,
}

impl Device {
    pub fn new(name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            id: DeviceId::generate(),
            name: name.into(),
            host: host.into(),
            port,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, secret_ref: impl Into<String>) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            secret_ref: secret_ref.into(),
        });
        self
    }

    /// クレデンシャルが設定されているか
    pub fn has_credentials(&self) -> bool {
        self.credentials
            .as_ref()
            .is_some_and(|c| !c.username.is_empty() && !c.secret_ref.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_without_credentials() {
        let dev = Device::new("edge-router", "192.0.2.1", 22);
        assert!(!dev.has_credentials());
    }

    #[test]
    fn device_with_credentials() {
        let dev = Device::new("edge-router", "192.0.2.1", 22).with_credentials("admin", "vault:router/edge");
        assert!(dev.has_credentials());
    }

    #[test]
    fn empty_secret_ref_counts_as_missing() {
        let dev = Device::new("edge-router", "192.0.2.1", 22).with_credentials("admin", "");
        assert!(!dev.has_credentials());
    }
}
