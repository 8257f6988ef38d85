//! ResponseClassifier - ordered decision table over (status, JSON body)

use contracts::{
    AttemptOutcome, ClassifierCheck, ClassifierConfig, HttpResponse, RetryReason, TerminalReason,
    TransportError,
};
use serde_json::{Map, Value};

/// `code` value used when the field is absent or not an integer
pub const MISSING_CODE: i64 = -1;

const RESULT_GRANTED: i64 = 1;
const RESULT_NOT_GRANTED: i64 = 3;

/// Maps one HTTP exchange to an [`AttemptOutcome`]
///
/// Fixed rows: transport failure, non-2xx, unparseable body. Then the three
/// code/message checks in configured precedence, then `data.apply_result`.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    not_eligible_code: i64,
    auth_keywords: Vec<String>,
    precedence: Vec<ClassifierCheck>,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

impl ResponseClassifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            not_eligible_code: config.not_eligible_code,
            auth_keywords: config
                .auth_keywords
                .iter()
                .map(|k| k.to_lowercase())
                .collect(),
            precedence: config.precedence.clone(),
        }
    }

    pub fn precedence(&self) -> &[ClassifierCheck] {
        &self.precedence
    }

    pub fn classify(&self, result: &Result<HttpResponse, TransportError>) -> AttemptOutcome {
        match result {
            Err(e) => AttemptOutcome::RetryableFailure(RetryReason::Transport(e.to_string())),
            Ok(response) => self.classify_response(response),
        }
    }

    pub fn classify_response(&self, response: &HttpResponse) -> AttemptOutcome {
        if !response.is_success() {
            return AttemptOutcome::RetryableFailure(RetryReason::HttpStatus(response.status));
        }

        let root = match serde_json::from_str::<Value>(&response.body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return AttemptOutcome::RetryableFailure(RetryReason::ParseError(format!(
                    "expected a JSON object, got {}",
                    json_kind(&other)
                )))
            }
            Err(e) => return AttemptOutcome::RetryableFailure(RetryReason::ParseError(e.to_string())),
        };

        let code = root.get("code").and_then(as_i64).unwrap_or(MISSING_CODE);
        let message = root
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        for check in &self.precedence {
            if let Some(outcome) = self.apply_check(*check, code, &message) {
                return outcome;
            }
        }

        match root.get("data").and_then(Value::as_object).map(apply_result) {
            Some(Some(RESULT_GRANTED)) => AttemptOutcome::Success,
            Some(Some(RESULT_NOT_GRANTED)) => {
                AttemptOutcome::RetryableFailure(RetryReason::NotGranted)
            }
            _ => AttemptOutcome::RetryableFailure(RetryReason::Unknown {
                body: response.body.clone(),
            }),
        }
    }

    fn apply_check(&self, check: ClassifierCheck, code: i64, message: &str) -> Option<AttemptOutcome> {
        match check {
            ClassifierCheck::NotEligible => (code == self.not_eligible_code).then_some(
                AttemptOutcome::TerminalFailure(TerminalReason::NotEligible { code }),
            ),
            ClassifierCheck::AuthKeyword => {
                let lowered = message.to_lowercase();
                self.auth_keywords
                    .iter()
                    .any(|k| lowered.contains(k.as_str()))
                    .then(|| {
                        AttemptOutcome::TerminalFailure(TerminalReason::AuthInvalid {
                            message: message.to_string(),
                        })
                    })
            }
            ClassifierCheck::ApiError => (code != 0).then(|| {
                AttemptOutcome::RetryableFailure(RetryReason::ApiError {
                    code,
                    message: message.to_string(),
                })
            }),
        }
    }
}

fn apply_result(data: &Map<String, Value>) -> Option<i64> {
    data.get("apply_result").and_then(as_i64)
}

/// Integer field, also accepting numeric strings
fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
