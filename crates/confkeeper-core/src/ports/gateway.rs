//! DeviceGateway port - 1 台のリモートデバイスへのトランスポート抽象
//!
//! 実装（SSH、ベンダー API など）はこのクレートのスコープ外です。
//! クレデンシャルは `Device` の構造化フィールドで渡します。コマンド文字列への
//! 補間はしません。
//!
//! # 設計原則
//! - 呼び出しはすべて orchestrator から見て同期的（1 呼び出し = 1 結果）
//! - タイムアウトは orchestrator 側で被せる（実装側は無限に待ってよい）

use async_trait::async_trait;
use std::path::Path;

use crate::domain::{BackupError, Device};

/// デバイス上のリモートファイル 1 件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub name: String,
    pub id: String,
}

/// DeviceGateway はデバイス 1 台へのネットワーク操作
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// デバイス側でスナップショット作成を要求する（作成自体は非同期）
    async fn trigger(&self, device: &Device, name: &str) -> Result<(), BackupError>;

    /// デバイス上のファイル一覧を取得する
    async fn list_remote_files(&self, device: &Device) -> Result<Vec<RemoteFile>, BackupError>;

    /// リモートファイルをローカルパスへ取得する
    async fn fetch(
        &self,
        device: &Device,
        remote_name: &str,
        local_path: &Path,
    ) -> Result<(), BackupError>;

    /// リモートファイルを削除する
    async fn delete_remote(&self, device: &Device, file_id: &str) -> Result<(), BackupError>;
}
