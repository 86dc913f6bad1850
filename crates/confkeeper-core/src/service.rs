//! Service facade - 外部レイヤーが消費するコア API surface
//!
//! HTTP ルーティングや認証はこのクレートのスコープ外です。外側のレイヤーは
//! ここの `run_backup` / `list_artifacts` / `next_scheduled_run` だけを呼びます。

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{BackupArtifact, BackupError, BackupKind, Device, DeviceId};
use crate::orchestrator::{BackupOrchestrator, OrchestratorConfig};
use crate::ports::{Clock, DeviceGateway};
use crate::repository::BackupRepository;
use crate::scheduler::BackupScheduler;

/// BackupService は orchestrator / scheduler / repository を束ねる facade
pub struct BackupService<C: Clock + Clone + Send + Sync + 'static> {
    orchestrator: Arc<BackupOrchestrator<C>>,
    scheduler: BackupScheduler<C>,
    repository: Arc<BackupRepository>,
}

impl<C: Clock + Clone + Send + Sync + 'static> BackupService<C> {
    pub fn new(
        gateway: Arc<dyn DeviceGateway>,
        repository: BackupRepository,
        clock: C,
        config: OrchestratorConfig,
    ) -> Self {
        let repository = Arc::new(repository);
        let orchestrator = Arc::new(BackupOrchestrator::new(
            gateway,
            Arc::clone(&repository),
            clock.clone(),
            config,
        ));
        let scheduler = BackupScheduler::new(Arc::clone(&orchestrator), clock);
        Self {
            orchestrator,
            scheduler,
            repository,
        }
    }

    /// バックアップを 1 回実行する
    ///
    /// Manual のエントリポイントでもある。タイマーの作成・削除・再設定は
    /// 一切しない。
    pub async fn run_backup(
        &self,
        device: &Device,
        kind: BackupKind,
    ) -> Result<BackupArtifact, BackupError> {
        self.orchestrator.run_backup(device, kind).await
    }

    /// デバイスのローカル artifact 一覧（新しい順）
    pub async fn list_artifacts(
        &self,
        device_id: DeviceId,
    ) -> Result<Vec<BackupArtifact>, BackupError> {
        self.repository.list(device_id).await
    }

    /// 最新のバックアップ時刻。無ければ None
    pub async fn last_backup_time(
        &self,
        device_id: DeviceId,
    ) -> Result<Option<DateTime<Utc>>, BackupError> {
        let artifacts = self.repository.list(device_id).await?;
        Ok(artifacts.first().map(|a| a.created_at))
    }

    /// デバイスの定期バックアップを登録（既存は差し替え）
    pub fn schedule(&self, device: Device, interval: Duration) {
        self.scheduler.add_or_replace(device, interval);
    }

    /// デフォルト間隔（60 分）で定期バックアップを登録
    pub fn schedule_default(&self, device: Device) {
        self.scheduler.add_or_replace_default(device);
    }

    /// デバイスの定期バックアップを解除
    pub fn unschedule(&self, device_id: DeviceId) -> bool {
        self.scheduler.remove(device_id)
    }

    /// 次回の scheduled run。未登録なら None
    pub fn next_scheduled_run(&self, device_id: DeviceId) -> Option<DateTime<Utc>> {
        self.scheduler.next_run_time(device_id)
    }

    /// 全タイマーを止める
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
    }
}
