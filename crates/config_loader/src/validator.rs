//! 配置校验模块
//!
//! 校验规则：
//! - 时间服务器列表非空，且无空项
//! - 所有超时与轮询间隔 > 0
//! - time_of_day / time_zone 可解析
//! - 请求地址为 http(s)
//! - 分类优先级是三项检查的一个排列
//! - 认证关键字非空

use std::collections::HashSet;

use contracts::{ClassifierCheck, ContractError, UnlockBlueprint};

/// 校验 UnlockBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &UnlockBlueprint) -> Result<(), ContractError> {
    validate_time(blueprint)?;
    validate_latency(blueprint)?;
    validate_schedule(blueprint)?;
    validate_wait(blueprint)?;
    validate_request(blueprint)?;
    validate_classifier(blueprint)?;
    Ok(())
}

/// 校验时间源
fn validate_time(blueprint: &UnlockBlueprint) -> Result<(), ContractError> {
    let time = &blueprint.time;
    if time.servers.is_empty() {
        return Err(ContractError::config_validation(
            "time.servers",
            "at least one time server is required",
        ));
    }
    for (idx, server) in time.servers.iter().enumerate() {
        if server.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("time.servers[{idx}]"),
                "server cannot be empty",
            ));
        }
    }
    if time.query_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "time.query_timeout_ms",
            "query_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验延迟探测
fn validate_latency(blueprint: &UnlockBlueprint) -> Result<(), ContractError> {
    let latency = &blueprint.latency;
    if latency.host.trim().is_empty() {
        return Err(ContractError::config_validation(
            "latency.host",
            "host cannot be empty",
        ));
    }
    if latency.timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "latency.timeout_ms",
            "timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验调度规则
fn validate_schedule(blueprint: &UnlockBlueprint) -> Result<(), ContractError> {
    blueprint
        .schedule
        .to_rule()
        .map(|_| ())
        .map_err(|e| ContractError::config_validation("schedule", e.to_string()))
}

/// 校验等待循环
fn validate_wait(blueprint: &UnlockBlueprint) -> Result<(), ContractError> {
    if blueprint.wait.poll_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "wait.poll_interval_ms",
            "poll_interval_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验请求配置
fn validate_request(blueprint: &UnlockBlueprint) -> Result<(), ContractError> {
    let request = &blueprint.request;
    if !(request.url.starts_with("https://") || request.url.starts_with("http://")) {
        return Err(ContractError::config_validation(
            "request.url",
            format!("url must start with http:// or https://, got '{}'", request.url),
        ));
    }
    if request.timeout_ms == Some(0) {
        return Err(ContractError::config_validation(
            "request.timeout_ms",
            "timeout_ms must be > 0 when set",
        ));
    }
    Ok(())
}

/// 校验响应分类配置
fn validate_classifier(blueprint: &UnlockBlueprint) -> Result<(), ContractError> {
    let classifier = &blueprint.classifier;

    let unique: HashSet<ClassifierCheck> = classifier.precedence.iter().copied().collect();
    if classifier.precedence.len() != 3 || unique.len() != 3 {
        return Err(ContractError::config_validation(
            "classifier.precedence",
            "precedence must list not_eligible, auth_keyword and api_error exactly once",
        ));
    }

    if classifier.auth_keywords.iter().any(|k| k.trim().is_empty()) {
        return Err(ContractError::config_validation(
            "classifier.auth_keywords",
            "keywords cannot be empty",
        ));
    }

    Ok(())
}
