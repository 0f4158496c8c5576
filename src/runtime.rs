//! Python subprocess runtime protocol.
//!
//! Interface only: the JSON request/response envelope, a caller with a hard
//! timeout, and the doctor probe. No stage currently dispatches work through
//! this runtime; it exists so deployments that delegate a stage to an
//! external process have a fixed contract to implement.
//!
//! Protocol: one request envelope `{stage, payload, options}` on stdin, one
//! response envelope `{ok: true, result}` or
//! `{ok: false, error: {code, message, details?}}` on stdout. The child is
//! killed when the configured timeout expires.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

/// Poll interval while waiting for the child to exit.
const WAIT_POLL_MS: u64 = 10;

/// Request envelope sent on the child's stdin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeRequest {
    /// Stage name the work belongs to.
    pub stage: String,
    /// Stage-specific payload.
    pub payload: Value,
    /// Caller options.
    #[serde(default)]
    pub options: Value,
}

/// Structured error in a failing response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeErrorBody {
    /// Machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional detail payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Response envelope read from the child's stdout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeResponse {
    /// Whether the call succeeded.
    pub ok: bool,
    /// Present when `ok` is true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Present when `ok` is false.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RuntimeErrorBody>,
}

/// Handle for invoking the external Python runtime.
#[derive(Debug, Clone)]
pub struct PythonRuntime {
    /// Interpreter binary, e.g. `python3`.
    pub python_bin: String,
    /// Arguments (typically the runtime script path).
    pub args: Vec<String>,
    /// Hard timeout per call.
    pub timeout: Duration,
}

impl Default for PythonRuntime {
    fn default() -> Self {
        Self {
            python_bin: "python3".into(),
            args: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl PythonRuntime {
    /// Send one request envelope and return the unwrapped `result`.
    ///
    /// Kills the child and fails if it does not exit within the timeout.
    pub fn call(&self, request: &RuntimeRequest) -> Result<Value> {
        let mut child = Command::new(&self.python_bin)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Error::runtime(format!("spawn {}: {e}", self.python_bin)))?;

        if let Some(stdin) = child.stdin.take() {
            let mut stdin = stdin;
            let body = serde_json::to_string(request)?;
            stdin
                .write_all(body.as_bytes())
                .and_then(|()| stdin.write_all(b"\n"))
                .map_err(|e| Error::runtime(format!("write request: {e}")))?;
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let status = self.wait_with_timeout(&mut child)?;
        if !status.success() {
            return Err(Error::runtime(format!(
                "runtime exited with status {status}"
            )));
        }

        let mut stdout = String::new();
        if let Some(mut out) = child.stdout.take() {
            out.read_to_string(&mut stdout)
                .map_err(|e| Error::runtime(format!("read response: {e}")))?;
        }
        let response: RuntimeResponse = serde_json::from_str(stdout.trim())
            .map_err(|e| Error::runtime(format!("bad response envelope: {e}")))?;
        if response.ok {
            Ok(response.result.unwrap_or(Value::Null))
        } else {
            let err = response.error.map_or_else(
                || "runtime reported failure without error body".to_string(),
                |e| format!("{}: {}", e.code, e.message),
            );
            Err(Error::runtime(err))
        }
    }

    fn wait_with_timeout(&self, child: &mut Child) -> Result<std::process::ExitStatus> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(Error::runtime(format!(
                            "runtime timed out after {:?}, killed",
                            self.timeout
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(WAIT_POLL_MS));
                }
                Err(e) => return Err(Error::runtime(format!("wait: {e}"))),
            }
        }
    }
}

// =============================================================================
// Doctor probe
// =============================================================================

/// Result of one doctor check.
#[derive(Debug, Clone, Serialize)]
pub struct DoctorFinding {
    /// Check name.
    pub check: String,
    /// Whether the check passed.
    pub ok: bool,
    /// What was observed.
    pub detail: String,
}

/// Probe the external runtime environment.
///
/// Checks that the interpreter starts and, when runtime args are configured,
/// that the protocol answers a `ping` request.
#[must_use]
pub fn doctor(runtime: &PythonRuntime) -> Vec<DoctorFinding> {
    let mut findings = Vec::new();

    let version = Command::new(&runtime.python_bin).arg("--version").output();
    match version {
        Ok(out) if out.status.success() => {
            let detail = String::from_utf8_lossy(&out.stdout).trim().to_string();
            let detail = if detail.is_empty() {
                String::from_utf8_lossy(&out.stderr).trim().to_string()
            } else {
                detail
            };
            findings.push(DoctorFinding {
                check: "interpreter".into(),
                ok: true,
                detail,
            });
        }
        Ok(out) => findings.push(DoctorFinding {
            check: "interpreter".into(),
            ok: false,
            detail: format!("{} exited with {}", runtime.python_bin, out.status),
        }),
        Err(e) => findings.push(DoctorFinding {
            check: "interpreter".into(),
            ok: false,
            detail: format!("{} not runnable: {e}", runtime.python_bin),
        }),
    }

    if runtime.args.is_empty() {
        findings.push(DoctorFinding {
            check: "protocol".into(),
            ok: true,
            detail: "no runtime script configured, protocol check skipped".into(),
        });
        return findings;
    }

    let ping = RuntimeRequest {
        stage: "ping".into(),
        payload: Value::Null,
        options: Value::Null,
    };
    match runtime.call(&ping) {
        Ok(_) => findings.push(DoctorFinding {
            check: "protocol".into(),
            ok: true,
            detail: "ping answered".into(),
        }),
        Err(e) => {
            log::warn!("runtime protocol check failed: {e}");
            findings.push(DoctorFinding {
                check: "protocol".into(),
                ok: false,
                detail: e.to_string(),
            });
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let req = RuntimeRequest {
            stage: "pos-tagging".into(),
            payload: serde_json::json!({"tokens": ["a", "b"]}),
            options: Value::Null,
        };
        let json = serde_json::to_string(&req).unwrap();
        let back: RuntimeRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.stage, "pos-tagging");
    }

    #[test]
    fn test_error_envelope_parses() {
        let raw = r#"{"ok": false, "error": {"code": "E_STAGE", "message": "unknown stage"}}"#;
        let response: RuntimeResponse = serde_json::from_str(raw).unwrap();
        assert!(!response.ok);
        assert_eq!(response.error.unwrap().code, "E_STAGE");
    }

    #[test]
    fn test_missing_binary_is_runtime_error() {
        let runtime = PythonRuntime {
            python_bin: "definitely-not-a-real-binary-42".into(),
            args: Vec::new(),
            timeout: Duration::from_millis(500),
        };
        let req = RuntimeRequest {
            stage: "ping".into(),
            payload: Value::Null,
            options: Value::Null,
        };
        let err = runtime.call(&req).unwrap_err();
        assert!(matches!(err, Error::Runtime(_)));
    }

    #[test]
    fn test_doctor_reports_missing_interpreter() {
        let runtime = PythonRuntime {
            python_bin: "definitely-not-a-real-binary-42".into(),
            ..PythonRuntime::default()
        };
        let findings = doctor(&runtime);
        assert!(findings.iter().any(|f| f.check == "interpreter" && !f.ok));
    }
}
