//! Retention - 保持ポリシーの計算（純粋関数）
//!
//! `compute_keep_set` は「今」と artifact 集合から keep-set を計算するだけで、
//! 副作用を持ちません。削除は呼び出し側（orchestrator の prune sweep）の責務です。
//!
//! # ポリシー
//! - **Manual**: 経過 1825 日（約 5 年）以内なら保持。バケット化なし。
//! - **Automatic**: 3 段階の aging tier
//!   1. 7 日未満: 全部保持
//!   2. 7 日以上 1095 日未満: `created_at` の暦日でバケット化。
//!      各バケットの最古は常に保持。バケットが 90 日未満で複数件あれば最新も保持
//!      （90 日までは 1 日 2 件、その後 3 年までは 1 日 1 件）。
//!   3. 1095 日以上: (ISO 年, ISO 週) でバケット化。最古のみ保持。
//!
//! tier の判定は渡された `now` に対して行うので、同じ artifact でも実行ごとに
//! 所属 tier が移っていきます。ファイル自体は変わりません。

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use std::collections::{BTreeMap, HashSet};

use crate::domain::{ArtifactId, BackupArtifact, BackupKind};

/// 全解像度で保持する直近の日数
const RECENT_DAYS: i64 = 7;

/// 1 日 2 件（最古+最新）を保持する上限
const TWO_PER_DAY_DAYS: i64 = 90;

/// 日次バケットの上限。これ以降は週次バケット
const WEEKLY_DAYS: i64 = 1095;

/// Manual バックアップのフラット保持期間（約 5 年）
const MANUAL_KEEP_DAYS: i64 = 1825;

/// keep-set を計算する
///
/// Manual と Automatic は独立したストリームとして処理し、結果は和集合です。
/// 入力が同じなら結果は常に同じ（決定的）です。
pub fn compute_keep_set(now: DateTime<Utc>, artifacts: &[BackupArtifact]) -> HashSet<ArtifactId> {
    let mut keep = HashSet::new();

    // 日次・週次バケット。BTreeMap なので走査順も決定的
    let mut daily: BTreeMap<NaiveDate, Vec<&BackupArtifact>> = BTreeMap::new();
    let mut weekly: BTreeMap<(i32, u32), Vec<&BackupArtifact>> = BTreeMap::new();

    for artifact in artifacts {
        let age_days = (now - artifact.created_at).num_days();

        match artifact.kind {
            BackupKind::Manual => {
                if age_days <= MANUAL_KEEP_DAYS {
                    keep.insert(artifact.id.clone());
                }
            }
            BackupKind::Automatic => {
                if age_days < RECENT_DAYS {
                    keep.insert(artifact.id.clone());
                } else if age_days < WEEKLY_DAYS {
                    daily
                        .entry(artifact.created_at.date_naive())
                        .or_default()
                        .push(artifact);
                } else {
                    let week = artifact.created_at.iso_week();
                    weekly
                        .entry((week.year(), week.week()))
                        .or_default()
                        .push(artifact);
                }
            }
        }
    }

    for members in daily.values_mut() {
        members.sort_by_key(|a| a.created_at);
        let earliest = members[0];
        keep.insert(earliest.id.clone());

        let bucket_age = (now - earliest.created_at).num_days();
        if bucket_age < TWO_PER_DAY_DAYS && members.len() > 1 {
            if let Some(latest) = members.last() {
                keep.insert(latest.id.clone());
            }
        }
    }

    for members in weekly.values_mut() {
        members.sort_by_key(|a| a.created_at);
        keep.insert(members[0].id.clone());
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DeviceId;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap()
    }

    fn artifact(kind: BackupKind, created_at: DateTime<Utc>) -> BackupArtifact {
        let name = format!(
            "{}.backup",
            crate::domain::backup_basename(kind, created_at)
        );
        BackupArtifact {
            id: ArtifactId::new(name.clone()),
            device_id: DeviceId::from_ulid(ulid::Ulid::from_parts(0, 0)),
            kind,
            created_at,
            storage_key: PathBuf::from(name),
            size_bytes: 1024,
        }
    }

    /// `days` 日前、正午から `hours_back` 時間戻した時刻の automatic artifact
    fn auto_aged(days: i64, hours_back: i64) -> BackupArtifact {
        artifact(
            BackupKind::Automatic,
            now() - Duration::days(days) - Duration::hours(hours_back),
        )
    }

    #[test]
    fn keep_set_is_deterministic() {
        let artifacts = vec![
            auto_aged(2, 0),
            auto_aged(8, 6),
            auto_aged(8, 1),
            auto_aged(95, 6),
            auto_aged(1200, 6),
        ];

        let first = compute_keep_set(now(), &artifacts);
        for _ in 0..10 {
            assert_eq!(compute_keep_set(now(), &artifacts), first);
        }
    }

    #[rstest]
    #[case::fresh(0)]
    #[case::three_days(3)]
    #[case::six_days(6)]
    fn recent_automatic_backups_are_all_kept(#[case] days: i64) {
        let a = auto_aged(days, 0);
        let b = auto_aged(days, 3);
        let keep = compute_keep_set(now(), &[a.clone(), b.clone()]);
        assert!(keep.contains(&a.id));
        assert!(keep.contains(&b.id));
    }

    #[test]
    fn day_bucket_under_90_days_keeps_earliest_and_latest() {
        // 同じ暦日に 3 件。最古と最新だけが残る
        let earliest = auto_aged(40, 8);
        let middle = auto_aged(40, 5);
        let latest = auto_aged(40, 1);

        let keep = compute_keep_set(now(), &[middle.clone(), latest.clone(), earliest.clone()]);
        assert!(keep.contains(&earliest.id));
        assert!(keep.contains(&latest.id));
        assert!(!keep.contains(&middle.id));
    }

    #[test]
    fn day_bucket_with_single_member_keeps_it() {
        let only = auto_aged(40, 3);
        let keep = compute_keep_set(now(), &[only.clone()]);
        assert_eq!(keep.len(), 1);
        assert!(keep.contains(&only.id));
    }

    #[test]
    fn day_bucket_past_90_days_keeps_only_earliest() {
        let earliest = auto_aged(95, 8);
        let latest = auto_aged(95, 1);

        let keep = compute_keep_set(now(), &[latest.clone(), earliest.clone()]);
        assert!(keep.contains(&earliest.id));
        assert!(!keep.contains(&latest.id));
    }

    #[test]
    fn week_bucket_keeps_only_earliest() {
        // 1200 日前の同じ ISO 週に 2 件
        let earliest = auto_aged(1200, 8);
        let latest = auto_aged(1200, 1);

        let keep = compute_keep_set(now(), &[latest.clone(), earliest.clone()]);
        assert!(keep.contains(&earliest.id));
        assert!(!keep.contains(&latest.id));
    }

    #[rstest]
    #[case::fresh(1, true)]
    #[case::one_year(365, true)]
    #[case::boundary(1825, true)]
    #[case::expired(1826, false)]
    fn manual_backups_have_flat_five_year_retention(#[case] days: i64, #[case] kept: bool) {
        let m = artifact(BackupKind::Manual, now() - Duration::days(days));
        let keep = compute_keep_set(now(), &[m.clone()]);
        assert_eq!(keep.contains(&m.id), kept);
    }

    #[test]
    fn manual_backups_are_not_bucketed() {
        // 同じ暦日に 3 件の manual。tiered 規則なら間引かれるが、全部残る
        let base = now() - Duration::days(40);
        let manuals: Vec<_> = (0..3)
            .map(|h| artifact(BackupKind::Manual, base - Duration::hours(h)))
            .collect();

        let keep = compute_keep_set(now(), &manuals);
        assert_eq!(keep.len(), 3);
    }

    /// ages {2, 8, 8, 40, 95, 95, 1200, 1200} の 8 件
    /// （各 pair は同一の日/週バケット）→ 6 件保持、2 件削除
    #[test]
    fn mixed_age_scenario_keeps_six_of_eight() {
        let age2 = auto_aged(2, 0);
        let age8_early = auto_aged(8, 6);
        let age8_late = auto_aged(8, 1);
        let age40 = auto_aged(40, 3);
        let age95_early = auto_aged(95, 6);
        let age95_late = auto_aged(95, 1);
        let age1200_early = auto_aged(1200, 6);
        let age1200_late = auto_aged(1200, 1);

        let artifacts = vec![
            age2.clone(),
            age8_early.clone(),
            age8_late.clone(),
            age40.clone(),
            age95_early.clone(),
            age95_late.clone(),
            age1200_early.clone(),
            age1200_late.clone(),
        ];

        let keep = compute_keep_set(now(), &artifacts);

        assert!(keep.contains(&age2.id));
        assert!(keep.contains(&age8_early.id));
        assert!(keep.contains(&age8_late.id));
        assert!(keep.contains(&age40.id));
        assert!(keep.contains(&age95_early.id));
        assert!(!keep.contains(&age95_late.id));
        assert!(keep.contains(&age1200_early.id));
        assert!(!keep.contains(&age1200_late.id));
        assert_eq!(keep.len(), 6);
    }

    #[test]
    fn tier_membership_shifts_as_time_passes() {
        // 6 日前の pair: 今日は両方残るが、2 日後には日次バケットに落ちる
        let early = auto_aged(6, 8);
        let late = auto_aged(6, 1);
        let artifacts = [early.clone(), late.clone()];

        let keep_today = compute_keep_set(now(), &artifacts);
        assert_eq!(keep_today.len(), 2);

        let keep_later = compute_keep_set(now() + Duration::days(2), &artifacts);
        assert!(keep_later.contains(&early.id));
        assert!(keep_later.contains(&late.id));

        // 90 日を越えると最新側が落ちる
        let keep_much_later = compute_keep_set(now() + Duration::days(90), &artifacts);
        assert!(keep_much_later.contains(&early.id));
        assert!(!keep_much_later.contains(&late.id));
    }

    #[test]
    fn empty_input_yields_empty_keep_set() {
        assert!(compute_keep_set(now(), &[]).is_empty());
    }
}
