//! # Time Sync
//!
//! 授时与发送时刻计算。
//!
//! 负责：
//! - 按顺序查询时间服务器 (SNTP)，取第一个成功结果
//! - 往返探测估算网络延迟
//! - 计算目标到达时刻与提前发送时刻
//! - 可取消的轮询等待
//!
//! ## 使用示例
//!
//! ```ignore
//! use time_sync::{compute_schedule, CancellableWaiter, LatencyProbe, SntpTransport, TcpReachability, TimeSource};
//!
//! let source = TimeSource::new(SntpTransport, Duration::from_secs(5));
//! let now = source.fetch_authoritative_time(&servers, &log).await?;
//!
//! let probe = LatencyProbe::new(TcpReachability, 180);
//! let latency = probe.estimate_latency("api.example.com:443", 3, Duration::from_secs(2), &cancel, &log).await;
//!
//! let window = compute_schedule(&now, latency, &rule)?;
//! let deadline = now.local_deadline(window.send_epoch_ms);
//! CancellableWaiter::new(Duration::from_millis(100)).wait_until(deadline, &cancel, &log).await;
//! ```

mod error;
mod latency;
mod reachability;
mod schedule;
mod sntp;
mod time_source;
mod waiter;

pub use error::TimeSyncError;
pub use latency::LatencyProbe;
pub use reachability::TcpReachability;
pub use schedule::{compute_schedule, compute_schedule_at, format_in_zone, next_arrival_ms};
pub use sntp::{ntp_to_unix_ms, parse_reply, SntpTransport, NTP_PORT};
pub use time_source::TimeSource;
pub use waiter::{CancellableWaiter, WaitOutcome};

// Re-export contracts types
pub use contracts::{AuthoritativeTime, LatencyEstimate, Rollover, ScheduleRule, ScheduleWindow};
