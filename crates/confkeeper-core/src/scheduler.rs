//! Scheduler - デバイスごとの定期タイマー
//!
//! 1 デバイスにつき live なエントリは常にちょうど 1 つ。`add_or_replace` は
//! 1 回のロック取得の中で旧タイマーの中止と新タイマーの登録を行うので、
//! 再設定中にタイマーが 0 個や 2 個に見える瞬間はありません。
//!
//! 発火は detached な run として spawn するため、
//! - 遅い/失敗するデバイスが他のデバイスのタイマーを塞がない
//! - タイマーの abort が実行中の run を巻き込まない
//!
//! 失敗時の即時リトライはしません。次の tick が暗黙のリトライです。
//! Manual run は orchestrator を直接呼ぶもので、ここのタイマーには触れません。

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;

use crate::domain::{BackupKind, Device, DeviceId};
use crate::orchestrator::BackupOrchestrator;
use crate::ports::Clock;

/// デフォルトのバックアップ間隔（60 分）
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// ScheduleEntry は 1 デバイスの live なタイマー
///
/// `generation` はどのタイマータスクがこのエントリの持ち主かを示す。
/// abort は次の await まで効かないので、差し替え/削除をまたいで生き延びた
/// 古いループはこの値の不一致で自分から抜ける。
struct ScheduleEntry {
    interval: Duration,
    next_run_at: DateTime<Utc>,
    generation: u64,
    handle: JoinHandle<()>,
}

type EntryMap = Arc<Mutex<HashMap<DeviceId, ScheduleEntry>>>;

/// BackupScheduler はデバイスごとの recurring タイマーを所有
///
/// グローバル状態は持たず、start/stop のライフサイクルはこのインスタンスが
/// 明示的に管理します。drop 時には全タイマーを止めます。
pub struct BackupScheduler<C: Clock + Clone + Send + Sync + 'static> {
    orchestrator: Arc<BackupOrchestrator<C>>,
    clock: C,
    entries: EntryMap,
    generation: AtomicU64,
}

impl<C: Clock + Clone + Send + Sync + 'static> BackupScheduler<C> {
    pub fn new(orchestrator: Arc<BackupOrchestrator<C>>, clock: C) -> Self {
        Self {
            orchestrator,
            clock,
            entries: Arc::new(Mutex::new(HashMap::new())),
            generation: AtomicU64::new(0),
        }
    }

    /// デバイスのタイマーを登録する。既存があれば差し替え
    pub fn add_or_replace(&self, device: Device, interval: Duration) {
        let device_id = device.id;
        let next_run_at = self.clock.now() + to_delta(interval);
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);

        let handle = tokio::spawn(timer_loop(
            device,
            interval,
            generation,
            Arc::clone(&self.orchestrator),
            self.clock.clone(),
            Arc::clone(&self.entries),
        ));

        let mut entries = lock(&self.entries);
        if let Some(old) = entries.insert(
            device_id,
            ScheduleEntry {
                interval,
                next_run_at,
                generation,
                handle,
            },
        ) {
            old.handle.abort();
        }
    }

    /// デフォルト間隔（60 分）でタイマーを登録する
    pub fn add_or_replace_default(&self, device: Device) {
        self.add_or_replace(device, DEFAULT_INTERVAL);
    }

    /// デバイスのタイマーを外す。あったかどうかを返す
    pub fn remove(&self, device_id: DeviceId) -> bool {
        match lock(&self.entries).remove(&device_id) {
            Some(entry) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    /// 次回実行時刻。未登録なら None
    pub fn next_run_time(&self, device_id: DeviceId) -> Option<DateTime<Utc>> {
        lock(&self.entries).get(&device_id).map(|e| e.next_run_at)
    }

    /// 登録中の間隔。未登録なら None
    pub fn interval(&self, device_id: DeviceId) -> Option<Duration> {
        lock(&self.entries).get(&device_id).map(|e| e.interval)
    }

    /// 全タイマーを止める
    pub fn shutdown(&self) {
        for (_, entry) in lock(&self.entries).drain() {
            entry.handle.abort();
        }
    }
}

impl<C: Clock + Clone + Send + Sync + 'static> Drop for BackupScheduler<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn lock(entries: &EntryMap) -> std::sync::MutexGuard<'_, HashMap<DeviceId, ScheduleEntry>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

fn to_delta(interval: Duration) -> TimeDelta {
    TimeDelta::from_std(interval).unwrap_or(TimeDelta::MAX)
}

/// 1 デバイスのタイマーループ
///
/// tick ごとに next_run_at を更新し、run を detached で spawn する。
/// run の結果はログに出すだけで、失敗してもループは続く。
///
/// sleep 明けにはまず自分の generation がまだエントリの持ち主かを確かめる。
/// 差し替え/削除済みならここで抜ける（abort が届く前に tick を迎えた場合でも
/// 新しいエントリの next_run_at を汚したり余分な run を spawn したりしない）。
async fn timer_loop<C: Clock + Clone + Send + Sync + 'static>(
    device: Device,
    interval: Duration,
    generation: u64,
    orchestrator: Arc<BackupOrchestrator<C>>,
    clock: C,
    entries: EntryMap,
) {
    loop {
        tokio::time::sleep(interval).await;

        match lock(&entries).get_mut(&device.id) {
            Some(entry) if entry.generation == generation => {
                entry.next_run_at = clock.now() + to_delta(interval);
            }
            _ => break,
        }

        let orchestrator = Arc::clone(&orchestrator);
        let device = device.clone();
        tokio::spawn(async move {
            match orchestrator.run_backup(&device, BackupKind::Automatic).await {
                Ok(artifact) => {
                    tracing::info!(device = %device.id, artifact = %artifact.id, "scheduled backup done");
                }
                Err(e) => {
                    // 次の tick が暗黙のリトライ
                    tracing::warn!(device = %device.id, error = %e, "scheduled backup failed");
                }
            }
        });
    }
}
