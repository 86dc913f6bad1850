use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

use confkeeper_core::domain::{BackupError, BackupKind, Device};
use confkeeper_core::orchestrator::OrchestratorConfig;
use confkeeper_core::ports::{DeviceGateway, RemoteFile, SystemClock};
use confkeeper_core::repository::BackupRepository;
use confkeeper_core::service::BackupService;

/// デモ用のインメモリ「ルーター」
///
/// trigger された名前をリモート一覧に積み、fetch でダミーの設定バイト列を
/// ローカルへ書き出す。本物の実装は SSH / ベンダー API で同じ contract を満たす。
struct DemoRouter {
    remote_files: Mutex<Vec<RemoteFile>>,
}

impl DemoRouter {
    fn new() -> Self {
        Self {
            remote_files: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl DeviceGateway for DemoRouter {
    async fn trigger(&self, device: &Device, name: &str) -> Result<(), BackupError> {
        tracing::info!(device = %device.name, name, "router: snapshot requested");
        // デバイス側の作成は非同期、という挙動を少しだけ真似る
        sleep(Duration::from_millis(100)).await;
        self.remote_files.lock().unwrap().push(RemoteFile {
            name: format!("{name}.backup"),
            id: format!("*{}", name.len()),
        });
        Ok(())
    }

    async fn list_remote_files(&self, _device: &Device) -> Result<Vec<RemoteFile>, BackupError> {
        Ok(self.remote_files.lock().unwrap().clone())
    }

    async fn fetch(
        &self,
        device: &Device,
        remote_name: &str,
        local_path: &Path,
    ) -> Result<(), BackupError> {
        let contents = format!("# config snapshot of {} ({remote_name})\n", device.name);
        tokio::fs::write(local_path, contents)
            .await
            .map_err(|e| BackupError::Transfer(e.to_string()))
    }

    async fn delete_remote(&self, _device: &Device, file_id: &str) -> Result<(), BackupError> {
        self.remote_files.lock().unwrap().retain(|f| f.id != file_id);
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let storage = tempfile::tempdir().expect("create demo storage dir");
    tracing::info!(root = %storage.path().display(), "backup storage");

    // (A) サービスを組み立てる
    let service = BackupService::new(
        Arc::new(DemoRouter::new()),
        BackupRepository::new(storage.path()),
        SystemClock,
        OrchestratorConfig {
            grace_period: Duration::from_millis(200),
            network_timeout: Duration::from_secs(10),
        },
    );

    let device =
        Device::new("edge-router", "192.0.2.1", 22).with_credentials("admin", "vault:router/edge");

    // (B) 定期バックアップを登録（デモなので 2 秒間隔）
    service.schedule(device.clone(), Duration::from_secs(2));
    if let Some(next) = service.next_scheduled_run(device.id) {
        tracing::info!(%next, "scheduled");
    }

    // (C) manual run はタイマーに触らず直接走る
    match service.run_backup(&device, BackupKind::Manual).await {
        Ok(artifact) => tracing::info!(artifact = %artifact.id, "manual backup done"),
        Err(e) => tracing::error!(error = %e, "manual backup failed"),
    }

    // (D) 自動発火を何回か眺める
    sleep(Duration::from_secs(5)).await;

    match service.list_artifacts(device.id).await {
        Ok(artifacts) => {
            tracing::info!(count = artifacts.len(), "local artifacts");
            for a in artifacts {
                tracing::info!(artifact = %a.id, kind = %a.kind, size = a.size_bytes, "  -");
            }
        }
        Err(e) => tracing::error!(error = %e, "listing failed"),
    }

    // (E) デモなのでタイマーを止めて終わる
    service.shutdown();
}
