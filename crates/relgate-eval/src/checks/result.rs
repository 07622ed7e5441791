use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    Warn,
    Failed,
}

impl Status {
    pub fn from_bool(ok: bool) -> Self {
        if ok { Status::Ok } else { Status::Failed }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Warn => "Warn",
            Status::Failed => "Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: Status,
    /// The clause text.
    pub reference: String,
    pub comment: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_like_the_report_expects() {
        let result = CheckResult {
            name: "Coverage".to_string(),
            status: Status::Ok,
            reference: "coverage.line > 80".to_string(),
            comment: "true".to_string(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "OK");
        assert_eq!(serde_json::to_value(Status::Failed).unwrap(), "Failed");
    }
}
