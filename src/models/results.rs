use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ValidationError;

/// Terminal status of one device within a bulk operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationStatus {
    Success,
    Failed,
    Skipped,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Success => "success",
            OperationStatus::Failed => "failed",
            OperationStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// DeviceResult is the outcome of an operation (render, push, session abort)
/// on a single device. The hostname is trimmed and never blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceResult {
    hostname: String,
    status: OperationStatus,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    diff: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl DeviceResult {
    pub fn new(hostname: &str, status: OperationStatus) -> Result<Self, ValidationError> {
        let hostname = hostname.trim();
        if hostname.is_empty() {
            return Err(ValidationError::InvalidDeviceResult(
                "Hostname cannot be empty or whitespace".to_string(),
            ));
        }

        Ok(Self {
            hostname: hostname.to_string(),
            status,
            message: String::new(),
            diff: None,
            error: None,
        })
    }

    pub fn success(hostname: &str) -> Result<Self, ValidationError> {
        Self::new(hostname, OperationStatus::Success)
    }

    pub fn skipped(hostname: &str) -> Result<Self, ValidationError> {
        Self::new(hostname, OperationStatus::Skipped)
    }

    /// Failed result carrying the error text; the message mirrors the error
    pub fn failed(hostname: &str, error: impl Into<String>) -> Result<Self, ValidationError> {
        let error = error.into();
        Ok(Self::new(hostname, OperationStatus::Failed)?
            .with_message(error.clone())
            .with_error(error))
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_diff(mut self, diff: impl Into<String>) -> Self {
        self.diff = Some(diff.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn diff(&self) -> Option<&str> {
        self.diff.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Read-only snapshot of an OperationResult, consumed by output formatting
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSummary {
    pub operation_name: String,
    pub total: usize,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub success_rate: f64,
}

/// OperationResult accumulates per-device results for one bulk operation.
///
/// Results are kept in the order they were added, which for a concurrent
/// fan-out is completion order. `add` takes `&mut self`; callers that run
/// devices in parallel join them back before adding (see `runner`).
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    operation_name: String,
    started_at: DateTime<Utc>,
    results: Vec<DeviceResult>,
}

impl OperationResult {
    pub fn new(operation_name: &str) -> Result<Self, ValidationError> {
        let operation_name = operation_name.trim();
        if operation_name.is_empty() {
            return Err(ValidationError::InvalidOperationName(
                "Operation name cannot be empty or whitespace".to_string(),
            ));
        }

        Ok(Self {
            operation_name: operation_name.to_string(),
            started_at: Utc::now(),
            results: Vec::new(),
        })
    }

    /// Append a result. No deduplication: a retried host appears once per attempt.
    pub fn add(&mut self, result: DeviceResult) {
        self.results.push(result);
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn results(&self) -> &[DeviceResult] {
        &self.results
    }

    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn success_count(&self) -> usize {
        self.count(OperationStatus::Success)
    }

    pub fn failure_count(&self) -> usize {
        self.count(OperationStatus::Failed)
    }

    pub fn skipped_count(&self) -> usize {
        self.count(OperationStatus::Skipped)
    }

    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Ratio of successful devices in [0.0, 1.0]; 0.0 when nothing ran
    pub fn success_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.success_count() as f64 / total as f64
    }

    /// Successful results that carry a non-blank diff
    pub fn diffs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.results.iter().filter_map(|r| match (r.status(), r.diff()) {
            (OperationStatus::Success, Some(d)) if !d.trim().is_empty() => Some((r.hostname(), d)),
            _ => None,
        })
    }

    pub fn to_summary(&self) -> OperationSummary {
        OperationSummary {
            operation_name: self.operation_name.clone(),
            total: self.total(),
            success_count: self.success_count(),
            failure_count: self.failure_count(),
            skipped_count: self.skipped_count(),
            success_rate: self.success_rate(),
        }
    }

    fn count(&self, status: OperationStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(host: &str, status: OperationStatus) -> DeviceResult {
        DeviceResult::new(host, status).unwrap()
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&OperationStatus::Success).unwrap(), "\"success\"");
        assert_eq!(serde_json::to_string(&OperationStatus::Failed).unwrap(), "\"failed\"");
        assert_eq!(serde_json::to_string(&OperationStatus::Skipped).unwrap(), "\"skipped\"");
        assert_eq!(OperationStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_device_result_hostname_trimmed() {
        let r = result(" l1 ", OperationStatus::Success);
        assert_eq!(r.hostname(), "l1");
        assert!(r.diff().is_none());
        assert!(r.error().is_none());
    }

    #[test]
    fn test_device_result_blank_hostname_rejected() {
        for host in ["", "   ", "\t\n"] {
            let err = DeviceResult::new(host, OperationStatus::Success).unwrap_err();
            assert!(matches!(err, ValidationError::InvalidDeviceResult(_)));
        }
    }

    #[test]
    fn test_device_result_with_diff() {
        let r = DeviceResult::success("spine1")
            .unwrap()
            .with_message("Diff retrieved successfully")
            .with_diff("+ interface Ethernet1");
        assert_eq!(r.status(), OperationStatus::Success);
        assert_eq!(r.message(), "Diff retrieved successfully");
        assert_eq!(r.diff(), Some("+ interface Ethernet1"));
    }

    #[test]
    fn test_failed_result_carries_error() {
        let r = DeviceResult::failed("l2", "TCP connection failed").unwrap();
        assert_eq!(r.status(), OperationStatus::Failed);
        assert_eq!(r.error(), Some("TCP connection failed"));
        assert_eq!(r.message(), "TCP connection failed");
    }

    #[test]
    fn test_operation_name_rejected_when_blank() {
        assert!(matches!(
            OperationResult::new("").unwrap_err(),
            ValidationError::InvalidOperationName(_)
        ));
        assert!(OperationResult::new("  ").is_err());
    }

    #[test]
    fn test_empty_operation_summary() {
        let op = OperationResult::new("render").unwrap();
        let summary = op.to_summary();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.success_rate, 0.0);
        assert!(!op.has_failures());
    }

    #[test]
    fn test_three_successes_one_failure() {
        let mut op = OperationResult::new("Push (Dry-Run)").unwrap();
        op.add(result("l1", OperationStatus::Success));
        op.add(result("l2", OperationStatus::Success));
        op.add(result("l3", OperationStatus::Success));
        op.add(result("s1", OperationStatus::Failed));

        let summary = op.to_summary();
        assert_eq!(summary.operation_name, "Push (Dry-Run)");
        assert_eq!(summary.total, 4);
        assert_eq!(summary.success_count, 3);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(summary.skipped_count, 0);
        assert_eq!(summary.success_rate, 0.75);
        assert!(op.has_failures());
    }

    #[test]
    fn test_mixed_statuses_and_duplicates() {
        let mut op = OperationResult::new("Session Abort").unwrap();
        op.add(result("l1", OperationStatus::Success));
        op.add(result("l1", OperationStatus::Skipped));
        op.add(result("l2", OperationStatus::Failed));

        assert_eq!(op.total(), 3);
        assert_eq!(op.skipped_count(), 1);
        let hosts: Vec<&str> = op.results().iter().map(|r| r.hostname()).collect();
        assert_eq!(hosts, vec!["l1", "l1", "l2"]);
    }

    #[test]
    fn test_diffs_only_from_successes() {
        let mut op = OperationResult::new("push").unwrap();
        op.add(result("l1", OperationStatus::Success).with_diff("+ vlan 10"));
        op.add(result("l2", OperationStatus::Success).with_diff("   "));
        op.add(result("l3", OperationStatus::Failed).with_diff("- vlan 10"));

        let diffs: Vec<(&str, &str)> = op.diffs().collect();
        assert_eq!(diffs, vec![("l1", "+ vlan 10")]);
    }

    #[test]
    fn test_summary_serializes_to_json() {
        let mut op = OperationResult::new("render").unwrap();
        op.add(result("l1", OperationStatus::Success));
        let json = serde_json::to_value(op.to_summary()).unwrap();
        assert_eq!(json["operation_name"], "render");
        assert_eq!(json["total"], 1);
        assert_eq!(json["success_rate"], 1.0);
    }

    #[test]
    fn test_device_result_json_shape() {
        let ok = serde_json::to_value(DeviceResult::success(" l1 ").unwrap().with_message("rendered")).unwrap();
        assert_eq!(ok, serde_json::json!({ "hostname": "l1", "status": "success", "message": "rendered" }));

        let failed = serde_json::to_value(DeviceResult::failed("l2", "timed out").unwrap()).unwrap();
        assert_eq!(failed["error"], "timed out");
        assert!(failed.get("diff").is_none());
    }
}
