//! Orchestrator - 1 デバイスの end-to-end バックアップ実行
//!
//! # フロー
//! Idle → Triggering → AwaitingAvailability → Transferring → Verifying
//!      → RemoteCleanup → Pruning → {Done, Failed}
//!
//! - デバイス側のスナップショット作成は非同期なので、トリガー後に bounded な
//!   grace period を 1 回だけ待つ（ポーリング/バックオフはしない）
//! - RemoteCleanup の失敗だけは WARN に落として成功を返す
//!   （ローカルの耐久性はすでに成立している）
//! - Verifying まで到達した実行は必ず prune sweep を走らせる
//!
//! # 排他
//! 同一デバイスの in-flight は常に最大 1。2 本目は `Busy` で即座に拒否し、
//! キューイングもインターリーブもしません。

use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::domain::artifact::BACKUP_EXTENSION;
use crate::domain::{
    BackupArtifact, BackupError, BackupKind, Device, DeviceId, backup_basename,
};
use crate::ports::{Clock, DeviceGateway};
use crate::repository::BackupRepository;
use crate::retention::compute_keep_set;

/// OrchestratorConfig は 1 回の実行のタイミング設定
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// トリガー後、リモート一覧を照合するまでの待ち時間
    pub grace_period: Duration,
    /// ネットワーク呼び出し 1 回あたりの上限
    pub network_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            network_timeout: Duration::from_secs(30),
        }
    }
}

/// BackupOrchestrator は trigger → fetch → cleanup → prune を駆動
pub struct BackupOrchestrator<C: Clock> {
    gateway: Arc<dyn DeviceGateway>,
    repository: Arc<BackupRepository>,
    clock: C,
    config: OrchestratorConfig,
    in_flight: Mutex<HashSet<DeviceId>>,
}

/// in-flight セットからの除去を drop に任せる guard
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<DeviceId>>,
    device_id: DeviceId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.device_id);
    }
}

impl<C: Clock> BackupOrchestrator<C> {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        repository: Arc<BackupRepository>,
        clock: C,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            gateway,
            repository,
            clock,
            config,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    pub fn repository(&self) -> &Arc<BackupRepository> {
        &self.repository
    }

    /// 1 回のバックアップを実行する
    ///
    /// 同一デバイスで実行中なら `Busy` を返します。キャンセルはサポートせず、
    /// 実行は必ず Done か Failed で終わります。
    pub async fn run_backup(
        &self,
        device: &Device,
        kind: BackupKind,
    ) -> Result<BackupArtifact, BackupError> {
        let _guard = self.acquire(device.id)?;

        if !device.has_credentials() {
            return Err(BackupError::CredentialsMissing);
        }

        self.execute(device, kind).await
    }

    /// in-flight セットに登録する。すでに居れば Busy
    fn acquire(&self, device_id: DeviceId) -> Result<InFlightGuard<'_>, BackupError> {
        let mut set = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !set.insert(device_id) {
            return Err(BackupError::Busy(device_id));
        }
        Ok(InFlightGuard {
            set: &self.in_flight,
            device_id,
        })
    }

    async fn execute(
        &self,
        device: &Device,
        kind: BackupKind,
    ) -> Result<BackupArtifact, BackupError> {
        // Triggering: トリガー時刻の名前が以降の照合キー兼パースキー
        let basename = backup_basename(kind, self.clock.now());
        let expected = format!("{basename}.{BACKUP_EXTENSION}");

        tracing::info!(device = %device.id, name = %basename, "triggering backup");
        self.bounded("trigger", self.gateway.trigger(device, &basename))
            .await?;

        // AwaitingAvailability: bounded な待ちを 1 回だけ
        tokio::time::sleep(self.config.grace_period).await;

        let files = self
            .bounded("list", self.gateway.list_remote_files(device))
            .await?;
        let target = files
            .into_iter()
            .find(|f| f.name == expected || f.name == basename)
            .ok_or_else(|| BackupError::ArtifactNotFound(expected.clone()))?;

        // Transferring: 失敗時はリモートに手を付けず、ローカルにも何も残さない
        let dir = self.repository.ensure_device_dir(device.id).await?;
        let local_path = dir.join(&expected);
        if let Err(e) = self
            .bounded("fetch", self.gateway.fetch(device, &target.name, &local_path))
            .await
        {
            // 途中まで書かれたファイルは規約どおりの名前を持つので、残すと
            // 次回以降の list に本物の artifact として現れてしまう
            let _ = tokio::fs::remove_file(&local_path).await;
            return Err(e);
        }

        // Verifying: ファイル名からメタデータを構築。これが外向きの成功シグナル
        let size_bytes = tokio::fs::metadata(&local_path).await?.len();
        let artifact = BackupArtifact::from_file(device.id, &expected, local_path, size_bytes)?;

        // RemoteCleanup: 失敗しても実行は成功のまま
        match self
            .bounded("cleanup", self.gateway.delete_remote(device, &target.id))
            .await
        {
            Ok(()) => {}
            Err(e) => {
                tracing::warn!(device = %device.id, error = %e, "remote cleanup failed, keeping local copy");
            }
        }

        // Pruning: Verifying まで来た実行は必ず sweep する
        self.prune(device.id).await?;

        tracing::info!(device = %device.id, artifact = %artifact.id, size = artifact.size_bytes, "backup complete");
        Ok(artifact)
    }

    /// keep-set を計算して、外れたローカル artifact を削除する
    async fn prune(&self, device_id: DeviceId) -> Result<(), BackupError> {
        let artifacts = self.repository.list(device_id).await?;
        let keep = compute_keep_set(self.clock.now(), &artifacts);

        for artifact in &artifacts {
            if !keep.contains(&artifact.id) {
                self.repository.delete(device_id, &artifact.id).await?;
                tracing::info!(device = %device_id, artifact = %artifact.id, "pruned backup");
            }
        }
        Ok(())
    }

    /// ネットワーク呼び出しに bounded timeout を被せる
    async fn bounded<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = Result<T, BackupError>>,
    ) -> Result<T, BackupError> {
        tokio::time::timeout(self.config.network_timeout, fut)
            .await
            .map_err(|_| BackupError::Timeout(stage))?
    }
}
