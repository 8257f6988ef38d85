//! # Controller
//!
//! 运行控制层：为每个运行模式提供 start / stop。
//!
//! 负责：
//! - 校验凭证并在后台任务中启动对应模式
//! - scheduled 模式：授时 → 延迟探测 → 计算发送时刻 → 可取消等待 → 分发
//! - manual 模式：直接进入分发与重试
//! - 通过 [`contracts::ShellEvents`] 向外部 shell 报告日志与运行状态
//!
//! ## 使用示例
//!
//! ```ignore
//! use controller::{DefaultController, RunMode};
//!
//! let controller = DefaultController::from_blueprint(blueprint, shell)?;
//! controller.start_mode(RunMode::Scheduled, &cookie)?;
//! // ...
//! controller.stop_mode(RunMode::Scheduled);
//! let report = controller.join(RunMode::Scheduled).await;
//! ```

mod controller;
mod error;
pub mod mock;
mod report;

use std::sync::Arc;

pub use controller::ProcessController;
pub use error::{ControllerError, Result};
pub use report::{RunReport, StartOutcome};

pub use contracts::{RunMode, RunState, ShellEvents, UnlockBlueprint};
use dispatcher::ReqwestTransport;
use time_sync::{SntpTransport, TcpReachability};

/// Controller over the real network transports
pub type DefaultController = ProcessController<SntpTransport, TcpReachability, ReqwestTransport>;

impl DefaultController {
    /// Build a controller using SNTP, TCP reachability probes and `reqwest`
    ///
    /// # Errors
    /// Invalid schedule rule, or the HTTP client cannot be built.
    pub fn from_blueprint(blueprint: UnlockBlueprint, shell: Arc<dyn ShellEvents>) -> Result<Self> {
        let http = ReqwestTransport::new(blueprint.request.timeout())?;
        Self::new(blueprint, SntpTransport, TcpReachability, http, shell)
    }
}
