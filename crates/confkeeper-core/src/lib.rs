//! confkeeper-core
//!
//! Core building blocks for the Confkeeper backup service.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, device, artifact, errors）
//! - **ports**: 抽象化レイヤー（DeviceGateway, Clock）
//! - **retention**: 保持ポリシーの純粋関数（keep-set の計算）
//! - **repository**: デバイスごとのローカル artifact ストレージ
//! - **orchestrator**: 1 回のバックアップ実行（trigger → fetch → cleanup → prune）
//! - **scheduler**: デバイスごとの定期タイマー
//! - **service**: 外部レイヤー（HTTP など）が使う薄い facade

pub mod domain;
pub mod ports;

pub mod retention;
pub mod repository;

pub mod orchestrator;
pub mod scheduler;
pub mod service;
