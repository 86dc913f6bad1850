//! BackupArtifact - ローカルに保存された 1 つのスナップショット
//!
//! ファイル名がメタデータの正本です。別のメタデータストアは持ちません。
//!
//! # ファイル名規約
//! - `auto_backup_{YYYYMMDD}_{HHMMSS}.backup`
//! - `manual_backup_{YYYYMMDD}_{HHMMSS}.backup`
//! - レガシー: `backup_{YYYYMMDD}_{HHMMSS}.backup`（kind なし → Automatic 扱い）

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::{BackupError, DeviceId};

/// バックアップファイルの拡張子（ドットなし）
pub const BACKUP_EXTENSION: &str = "backup";

/// BackupKind はスナップショットの発火元
///
/// - `Automatic`: scheduler 発火。tiered retention の対象
/// - `Manual`: オペレーター発火。フラットな 5 年保持
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BackupKind {
    Manual,
    Automatic,
}

impl BackupKind {
    /// ファイル名のプレフィックス
    pub fn prefix(&self) -> &'static str {
        match self {
            BackupKind::Manual => "manual",
            BackupKind::Automatic => "auto",
        }
    }
}

impl fmt::Display for BackupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// ArtifactId はローカルファイル名そのもの
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// BackupArtifact は 1 デバイスの 1 スナップショット
///
/// `created_at` はファイル名から決定的に導出されます（秒精度）。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub id: ArtifactId,
    pub device_id: DeviceId,
    pub kind: BackupKind,
    pub created_at: DateTime<Utc>,
    pub storage_key: PathBuf,
    pub size_bytes: u64,
}

impl BackupArtifact {
    /// ファイル名をパースして artifact を構築
    pub fn from_file(
        device_id: DeviceId,
        file_name: &str,
        storage_key: PathBuf,
        size_bytes: u64,
    ) -> Result<Self, BackupError> {
        let (kind, created_at) = parse_backup_filename(file_name)?;
        Ok(Self {
            id: ArtifactId::new(file_name),
            device_id,
            kind,
            created_at,
            storage_key,
            size_bytes,
        })
    }
}

/// トリガー時に使うベース名（拡張子なし）を組み立てる
///
/// 例: `auto_backup_20240110_120000`
/// この名前がそのままリモート照合キーとパースキーになります。
pub fn backup_basename(kind: BackupKind, at: DateTime<Utc>) -> String {
    format!("{}_backup_{}", kind.prefix(), at.format("%Y%m%d_%H%M%S"))
}

/// ファイル名規約の型付きパーサ
///
/// 解釈できない名前は `BackupError::Parse` を返します。黙って無視はしません。
/// レガシーの 2 フィールド形式（kind プレフィックスなし）は Automatic として
/// パースします。
pub fn parse_backup_filename(name: &str) -> Result<(BackupKind, DateTime<Utc>), BackupError> {
    let stem = name
        .strip_suffix(".backup")
        .ok_or_else(|| BackupError::Parse(name.to_string()))?;

    let parts: Vec<&str> = stem.split('_').collect();
    let (kind, date, time) = match parts.as_slice() {
        ["backup", date, time] => (BackupKind::Automatic, *date, *time),
        ["auto", "backup", date, time] => (BackupKind::Automatic, *date, *time),
        ["manual", "backup", date, time] => (BackupKind::Manual, *date, *time),
        _ => return Err(BackupError::Parse(name.to_string())),
    };

    let naive = NaiveDateTime::parse_from_str(&format!("{date}{time}"), "%Y%m%d%H%M%S")
        .map_err(|_| BackupError::Parse(name.to_string()))?;

    Ok((kind, naive.and_utc()))
}
