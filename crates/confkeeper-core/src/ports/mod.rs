//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（デバイスへのネットワークトランスポート、時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod gateway;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::gateway::{DeviceGateway, RemoteFile};
