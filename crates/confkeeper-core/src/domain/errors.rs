use thiserror::Error;

use super::DeviceId;

/// BackupError は 1 回のバックアップ実行のエラー分類
///
/// `RemoteCleanup` 以外はすべてその実行にとって terminal です。
/// `RemoteCleanup` だけは orchestrator が WARN に落として成功を返します
/// （ローカルの耐久性はすでに成立しているため）。
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("device credentials missing")]
    CredentialsMissing,

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("artifact not found on device: {0}")]
    ArtifactNotFound(String),

    #[error("transfer failed: {0}")]
    Transfer(String),

    #[error("remote cleanup failed: {0}")]
    RemoteCleanup(String),

    #[error("timed out during {0}")]
    Timeout(&'static str),

    #[error("backup already in flight for {0}")]
    Busy(DeviceId),

    #[error("unrecognized backup filename: {0}")]
    Parse(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
