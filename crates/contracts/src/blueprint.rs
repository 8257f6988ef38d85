//! UnlockBlueprint - Config Loader 输出
//!
//! 描述完整的运行配置：时间源、延迟探测、调度规则、等待、请求、响应分类、重试策略。

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{ContractError, Rollover, RunMode, ScheduleRule};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的运行配置蓝图
///
/// 所有字段都有默认值，空文件即为合法配置。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlockBlueprint {
    /// 配置版本
    pub version: ConfigVersion,

    /// 时间源 (NTP)
    pub time: TimeConfig,

    /// 延迟探测
    pub latency: LatencyConfig,

    /// 到达时刻规则
    pub schedule: ScheduleConfig,

    /// 等待循环
    pub wait: WaitConfig,

    /// 解锁请求
    pub request: RequestConfig,

    /// 响应分类
    pub classifier: ClassifierConfig,

    /// 重试策略
    pub retry: RetryConfig,
}

/// 时间源配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// 按顺序查询的时间服务器 (`host` 或 `host:port`)
    pub servers: Vec<String>,

    /// 单次查询超时 (毫秒)
    pub query_timeout_ms: u64,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            servers: vec![
                "time.google.com".to_string(),
                "time.cloudflare.com".to_string(),
                "pool.ntp.org".to_string(),
                "ntp.aliyun.com".to_string(),
            ],
            query_timeout_ms: 5000,
        }
    }
}

impl TimeConfig {
    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }
}

/// 延迟探测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// 探测目标主机
    pub host: String,

    /// 探测端口
    pub port: u16,

    /// 探测次数
    pub samples: u32,

    /// 单次探测超时 (毫秒)
    pub timeout_ms: u64,

    /// 全部失败时使用的默认延迟 (毫秒)
    pub default_ms: u64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            host: "sgp-api.buy.mi.com".to_string(),
            port: 443,
            samples: 3,
            timeout_ms: 2000,
            default_ms: 180,
        }
    }
}

impl LatencyConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// `host:port` target for the reachability probe
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 调度规则配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// 目标到达时刻 `HH:MM:SS[.fff]`
    pub time_of_day: String,

    /// IANA 时区名
    pub time_zone: String,

    /// 日期滚动策略
    pub rollover: Rollover,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            time_of_day: "00:00:00".to_string(),
            time_zone: "Asia/Shanghai".to_string(),
            rollover: Rollover::NextCalendarDay,
        }
    }
}

impl ScheduleConfig {
    /// 解析为 [`ScheduleRule`]
    pub fn to_rule(&self) -> Result<ScheduleRule, ContractError> {
        ScheduleRule::parse(&self.time_of_day, &self.time_zone, self.rollover)
    }
}

/// 等待循环配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// 取消标志轮询间隔 (毫秒)
    pub poll_interval_ms: u64,

    /// 倒计时日志间隔 (毫秒, 0 = 关闭)
    pub countdown_log_interval_ms: u64,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            countdown_log_interval_ms: 1000,
        }
    }
}

impl WaitConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn countdown_interval(&self) -> Option<Duration> {
        (self.countdown_log_interval_ms > 0)
            .then(|| Duration::from_millis(self.countdown_log_interval_ms))
    }
}

/// 解锁请求配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// API 地址
    pub url: String,

    /// User-Agent 请求头
    pub user_agent: String,

    /// 请求超时 (毫秒, None = 传输层默认)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            url: "https://sgp-api.buy.mi.com/bbs/api/global/apply/bl-auth".to_string(),
            user_agent: "okhttp/4.12.0".to_string(),
            timeout_ms: None,
        }
    }
}

impl RequestConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// The three code/message checks whose order is configurable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierCheck {
    /// Reserved "ineligible account" code → terminal
    NotEligible,
    /// Authentication keyword in the message → terminal
    AuthKeyword,
    /// Any non-zero code → retryable
    ApiError,
}

/// 响应分类配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// 账号不符合条件的业务码
    pub not_eligible_code: i64,

    /// 认证失效关键字 (不区分大小写)
    pub auth_keywords: Vec<String>,

    /// 三项检查的优先级顺序
    pub precedence: Vec<ClassifierCheck>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            not_eligible_code: 20036,
            auth_keywords: vec!["login".into(), "cookie".into(), "auth".into()],
            precedence: vec![
                ClassifierCheck::NotEligible,
                ClassifierCheck::AuthKeyword,
                ClassifierCheck::ApiError,
            ],
        }
    }
}

/// 重试策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// 只发送一次
    #[default]
    SingleAttempt,
    /// 持续重试直到成功、终止失败或取消
    ContinuousRetry,
}

/// 重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// scheduled 模式策略
    pub scheduled: RetryPolicy,

    /// manual 模式策略
    pub manual: RetryPolicy,

    /// 两次尝试之间的间隔 (毫秒)
    pub inter_attempt_delay_ms: u64,

    /// 最大尝试次数 (0 = 不限)
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            scheduled: RetryPolicy::SingleAttempt,
            manual: RetryPolicy::SingleAttempt,
            inter_attempt_delay_ms: 250,
            max_attempts: 0,
        }
    }
}

impl RetryConfig {
    pub fn policy_for(&self, mode: RunMode) -> RetryPolicy {
        match mode {
            RunMode::Scheduled => self.scheduled,
            RunMode::Manual => self.manual,
        }
    }

    pub fn inter_attempt_delay(&self) -> Duration {
        Duration::from_millis(self.inter_attempt_delay_ms)
    }

    pub fn attempt_cap(&self) -> Option<u32> {
        (self.max_attempts > 0).then_some(self.max_attempts)
    }
}
