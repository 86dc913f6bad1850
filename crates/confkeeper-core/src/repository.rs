//! Repository - デバイスごとのローカル artifact ストレージ
//!
//! レイアウトは `root/<device_id>/` の 1 デバイス 1 ディレクトリ。
//! メタデータはファイル名規約 + ファイルシステムのサイズだけから導出します。
//! 別のメタデータストアは持ちません。
//!
//! パースできない名前のファイルは WARN を出してスキップします。ディスク上には
//! 残したまま、retention からは見えません（削除もされません）。

use std::io::ErrorKind;
use std::path::PathBuf;

use crate::domain::{parse_backup_filename, ArtifactId, BackupArtifact, BackupError, DeviceId};

/// BackupRepository はベースディレクトリ配下の artifact を管理
#[derive(Debug, Clone)]
pub struct BackupRepository {
    root: PathBuf,
}

impl BackupRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// デバイスのディレクトリパス
    pub fn device_dir(&self, device_id: DeviceId) -> PathBuf {
        self.root.join(device_id.to_string())
    }

    /// デバイスのディレクトリを作成して返す
    pub async fn ensure_device_dir(&self, device_id: DeviceId) -> Result<PathBuf, BackupError> {
        let dir = self.device_dir(device_id);
        tokio::fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// デバイスの artifact 一覧（新しい順）
    ///
    /// ディレクトリがまだ無い場合は空を返します（一度もバックアップしていない
    /// デバイス）。
    pub async fn list(&self, device_id: DeviceId) -> Result<Vec<BackupArtifact>, BackupError> {
        let dir = self.device_dir(device_id);

        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut artifacts = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.ends_with(".backup") {
                continue;
            }

            let size_bytes = entry.metadata().await?.len();
            match BackupArtifact::from_file(device_id, name, entry.path(), size_bytes) {
                Ok(artifact) => artifacts.push(artifact),
                Err(_) => {
                    tracing::warn!(device = %device_id, file = name, "skipping unparseable backup file");
                }
            }
        }

        artifacts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(artifacts)
    }

    /// artifact id を検証してデバイスディレクトリ内のパスに解決する
    ///
    /// id は規約どおりのファイル名でなければならない。パーサはセパレータを
    /// 含む名前や `..` を一切受け付けないので、ここを通った id が
    /// デバイスディレクトリの外を指すことはない。
    fn artifact_path(
        &self,
        device_id: DeviceId,
        artifact_id: &ArtifactId,
    ) -> Result<PathBuf, BackupError> {
        parse_backup_filename(artifact_id.as_str())?;
        Ok(self.device_dir(device_id).join(artifact_id.as_str()))
    }

    /// artifact を削除する
    pub async fn delete(
        &self,
        device_id: DeviceId,
        artifact_id: &ArtifactId,
    ) -> Result<(), BackupError> {
        let path = self.artifact_path(device_id, artifact_id)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    /// artifact をバイトストリームとして開く
    pub async fn open(
        &self,
        device_id: DeviceId,
        artifact_id: &ArtifactId,
    ) -> Result<tokio::fs::File, BackupError> {
        let path = self.artifact_path(device_id, artifact_id)?;
        Ok(tokio::fs::File::open(&path).await?)
    }
}
