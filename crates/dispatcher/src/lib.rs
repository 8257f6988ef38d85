//! # Dispatcher
//!
//! 解锁请求分发模块。
//!
//! 负责：
//! - 构造并发送解锁请求 (`RequestDispatcher`)
//! - 按有序决策表分类响应 (`ResponseClassifier`)
//! - 按策略重试 (`RetryScheduler`)
//! - 记录每次尝试的状态、耗时与结果

pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod metrics;
pub mod retry;

pub use classifier::{ResponseClassifier, MISSING_CODE};
pub use contracts::{AttemptOutcome, FinalOutcome, HttpTransport};
pub use dispatcher::{Dispatch, LocalDispatch, RequestDispatcher};
pub use error::DispatcherError;
pub use http::ReqwestTransport;
pub use metrics::{DispatchMetrics, MetricsSnapshot};
pub use retry::RetryScheduler;
