//! Subversion tool: read-only repository queries through the `svn` CLI.
//!
//! Supports `log`, `diff`, `info`, `status`, and `blame` against one
//! configured working copy or repository URL. Paths are resolved inside
//! that target; revisions are validated before reaching the command line.

use std::path::{Component, Path};
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};
use wikiagent_core::error::ToolError;
use wikiagent_core::memory::MessageLog;
use wikiagent_core::message::Role;
use wikiagent_core::tool::{ToolArguments, ToolDefinition, ToolHandler, ToolParameter};

pub const TOOL_NAME: &str = "svn_operation";

const MODULE: &str = "svn";
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
const MAX_OUTPUT_CHARS: usize = 8000;

/// Which `svn` subcommand to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SvnOperation {
    Log,
    Diff,
    Info,
    Status,
    Blame,
}

impl SvnOperation {
    fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Some(Self::Log),
            "diff" => Some(Self::Diff),
            "info" => Some(Self::Info),
            "status" => Some(Self::Status),
            "blame" => Some(Self::Blame),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Diff => "diff",
            Self::Info => "info",
            Self::Status => "status",
            Self::Blame => "blame",
        }
    }
}

/// Answers `svn_operation` for one repository.
pub struct SvnHandler {
    repository: String,
    binary: String,
    timeout: Duration,
}

impl SvnHandler {
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            binary: "svn".into(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Use a different executable, e.g. an absolute path to `svn`.
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_url(&self) -> bool {
        self.repository.contains("://")
    }

    /// Resolve a relative path inside the configured target.
    fn target(&self, path: &str) -> Result<String, ToolError> {
        let path = path.trim();
        if path.is_empty() || path == "." {
            return Ok(self.repository.clone());
        }

        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(ToolError::InvalidArguments(format!(
                "path '{path}' must be relative to the repository"
            )));
        }

        if self.is_url() {
            Ok(format!("{}/{}", self.repository.trim_end_matches('/'), path.trim_start_matches("./")))
        } else {
            Ok(Path::new(&self.repository).join(relative).display().to_string())
        }
    }

    /// The full argument list for one operation.
    fn build_args(
        &self,
        operation: SvnOperation,
        path: &str,
        revision: Option<&str>,
        limit: i64,
    ) -> Result<Vec<String>, ToolError> {
        let target = self.target(path)?;
        if let Some(rev) = revision {
            validate_revision(rev)?;
        }

        let mut args: Vec<String> = vec![operation.as_str().into(), "--non-interactive".into()];
        match operation {
            SvnOperation::Log => {
                args.push("-l".into());
                args.push(limit.clamp(1, MAX_LIMIT).to_string());
                if let Some(rev) = revision {
                    args.extend(["-r".into(), rev.to_string()]);
                }
            }
            SvnOperation::Diff => match revision {
                Some(rev) if rev.contains(':') => args.extend(["-r".into(), rev.to_string()]),
                Some(rev) => args.extend(["-c".into(), rev.to_string()]),
                None => {}
            },
            SvnOperation::Info | SvnOperation::Blame => {
                if let Some(rev) = revision {
                    args.extend(["-r".into(), rev.to_string()]);
                }
            }
            SvnOperation::Status => {
                if self.is_url() {
                    return Err(ToolError::InvalidArguments(
                        "status needs a working copy, not a repository URL".into(),
                    ));
                }
            }
        }
        args.push(target);
        Ok(args)
    }

    async fn run(&self, args: &[String]) -> Result<String, ToolError> {
        debug!(binary = %self.binary, ?args, "Running svn");

        let output = tokio::time::timeout(
            self.timeout,
            Command::new(&self.binary).args(args).kill_on_drop(true).output(),
        )
        .await
        .map_err(|_| ToolError::Timeout {
            tool_name: TOOL_NAME.into(),
            timeout_secs: self.timeout.as_secs(),
        })?
        .map_err(|e| ToolError::ExecutionFailed {
            tool_name: TOOL_NAME.into(),
            reason: format!("cannot run '{}': {e}", self.binary),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            warn!(exit_code = code, stderr = %stderr.trim(), "svn failed");
            return Err(ToolError::ExecutionFailed {
                tool_name: TOOL_NAME.into(),
                reason: format!("svn exited with {code}: {}", stderr.trim()),
            });
        }
        Ok(stdout)
    }
}

#[async_trait]
impl ToolHandler for SvnHandler {
    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        vec![
            ToolDefinition::new(
                TOOL_NAME,
                "Run read-only Subversion queries: commit logs, diffs, file info, working copy status, and blame.",
            )
            .param(
                ToolParameter::string("operation", "SVN operation: 'log', 'diff', 'info', 'status', 'blame'")
                    .required()
                    .one_of(["log", "diff", "info", "status", "blame"]),
            )
            .param(ToolParameter::string("path", "File or directory relative to the repository (optional)"))
            .param(ToolParameter::string("revision", "Revision or range, e.g. '1234', 'HEAD', '1000:1100'"))
            .param(ToolParameter::string("limit", "Maximum entries for log (e.g. '10')")),
        ]
    }

    async fn execute(
        &self,
        _tool_name: &str,
        arguments: &ToolArguments,
        log: &MessageLog,
    ) -> Result<String, ToolError> {
        let raw_operation = arguments
            .get_string("operation")
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'operation' argument".into()))?;
        let operation = SvnOperation::parse(&raw_operation).ok_or_else(|| {
            ToolError::InvalidArguments(format!(
                "unknown operation '{raw_operation}', expected log, diff, info, status or blame"
            ))
        })?;
        let path = arguments.get_str_or("path", ".");
        let revision = arguments.get_string("revision").filter(|r| !r.trim().is_empty());
        let limit = arguments.get_int("limit").unwrap_or(DEFAULT_LIMIT);

        log.append_module(
            MODULE,
            Role::System,
            format!(
                "svn {} path={path} rev={}",
                operation.as_str(),
                revision.as_deref().unwrap_or("HEAD")
            ),
        );

        let args = self.build_args(operation, &path, revision.as_deref(), limit)?;
        let output = self.run(&args).await?;
        Ok(format_output(operation, &path, &output))
    }
}

/// Accepts a number, a keyword, or a `from:to` range of those.
fn validate_revision(revision: &str) -> Result<(), ToolError> {
    fn single(r: &str) -> bool {
        let r = r.trim();
        !r.is_empty()
            && (r.chars().all(|c| c.is_ascii_digit())
                || matches!(r.to_ascii_uppercase().as_str(), "HEAD" | "BASE" | "COMMITTED" | "PREV"))
    }
    let ok = match revision.split_once(':') {
        Some((from, to)) => single(from) && single(to),
        None => single(revision),
    };
    if ok {
        Ok(())
    } else {
        Err(ToolError::InvalidArguments(format!("invalid revision '{revision}'")))
    }
}

fn format_output(operation: SvnOperation, path: &str, output: &str) -> String {
    let body = output.trim();
    if body.is_empty() {
        return format!("svn {} {path}: no output.", operation.as_str());
    }
    let mut text: String = body.chars().take(MAX_OUTPUT_CHARS).collect();
    if body.chars().count() > MAX_OUTPUT_CHARS {
        text.push_str("\n... (output truncated)");
    }
    format!("svn {} {path}:\n\n{text}", operation.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_args_clamp_limit() {
        let h = SvnHandler::new("/srv/wc");
        let args = h.build_args(SvnOperation::Log, "trunk/src", None, 500).unwrap();
        assert_eq!(args, vec!["log", "--non-interactive", "-l", "100", "/srv/wc/trunk/src"]);
    }

    #[test]
    fn diff_uses_change_or_range() {
        let h = SvnHandler::new("https://svn.example.org/repo/");
        let single = h.build_args(SvnOperation::Diff, "", Some("1234"), 10).unwrap();
        assert_eq!(single, vec!["diff", "--non-interactive", "-c", "1234", "https://svn.example.org/repo/"]);

        let range = h.build_args(SvnOperation::Diff, "a.txt", Some("1000:1100"), 10).unwrap();
        assert_eq!(range[2..4], ["-r".to_string(), "1000:1100".to_string()]);
        assert_eq!(range[4], "https://svn.example.org/repo/a.txt");
    }

    #[test]
    fn status_requires_working_copy() {
        let h = SvnHandler::new("svn://host/repo");
        assert!(h.build_args(SvnOperation::Status, ".", None, 10).is_err());
        assert!(SvnHandler::new(".").build_args(SvnOperation::Status, ".", None, 10).is_ok());
    }

    #[test]
    fn paths_cannot_escape() {
        let h = SvnHandler::new("/srv/wc");
        assert!(h.target("../etc/passwd").is_err());
        assert!(h.target("/etc/passwd").is_err());
        assert_eq!(h.target(".").unwrap(), "/srv/wc");
    }

    #[test]
    fn revision_validation() {
        assert!(validate_revision("1234").is_ok());
        assert!(validate_revision("HEAD").is_ok());
        assert!(validate_revision("100:head").is_ok());
        assert!(validate_revision("--force").is_err());
        assert!(validate_revision("1:").is_err());
    }

    #[test]
    fn output_formatting() {
        assert_eq!(format_output(SvnOperation::Status, ".", "  \n"), "svn status .: no output.");
        let long = "x".repeat(MAX_OUTPUT_CHARS + 10);
        assert!(format_output(SvnOperation::Log, ".", &long).ends_with("(output truncated)"));
    }

    #[tokio::test]
    async fn unknown_operation_is_rejected_before_logging() {
        let h = SvnHandler::new(".");
        let log = MessageLog::new();
        let err = h
            .execute(TOOL_NAME, &ToolArguments::new().with("operation", "commit"), &log)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
        assert!(log.module(MODULE).is_empty());
    }

    #[tokio::test]
    async fn missing_binary_is_execution_failure_and_still_traced() {
        let h = SvnHandler::new(".").with_binary("/nonexistent/bin/svn");
        let log = MessageLog::new();
        let args = ToolArguments::new().with("operation", "info").with("revision", "HEAD");
        let err = h.execute(TOOL_NAME, &args, &log).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert_eq!(log.module(MODULE).len(), 1);
        assert!(log.module(MODULE)[0].content.contains("svn info"));
    }
}
