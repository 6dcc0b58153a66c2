//! Scripted stand-ins for the process and signature seams.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::UpdaterError;
use crate::upgrade::{SignatureInspector, SignatureReport, SignatureStatus};
use crate::utils::process::{CommandOutput, CommandRunner};

/// A program invocation seen by [`FakeRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    /// Program as passed to the runner
    pub program: PathBuf,
    /// Arguments
    pub args: Vec<OsString>,
    /// Argument appended verbatim after `args`, if any
    pub raw_tail: Option<OsString>,
}

impl RecordedCall {
    /// File stem of the program, lowercased.
    #[must_use]
    pub fn stem(&self) -> String {
        program_stem(&self.program)
    }
}

/// Canned behaviour for one program.
#[derive(Debug, Clone)]
pub enum FakeResponse {
    /// The program ran and produced this output
    Output(CommandOutput),
    /// The program could not be started
    LaunchFailure,
    /// The program did not finish in time
    Timeout,
}

impl FakeResponse {
    /// Exit code 0 with `stdout`.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self::Output(CommandOutput {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        })
    }

    /// Exit with `code` and `stderr`.
    pub fn exit(code: i32, stderr: impl Into<String>) -> Self {
        Self::Output(CommandOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        })
    }
}

fn program_stem(program: &Path) -> String {
    program
        .file_stem()
        .map(|s| s.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

/// [`CommandRunner`] answering from a table keyed by program file stem.
///
/// Responses queued with [`FakeRunner::then`] are used first, one per call;
/// after that the fixed answer set with [`FakeRunner::on`] applies. Programs
/// with neither fail to launch. Every call is recorded.
#[derive(Debug, Default)]
pub struct FakeRunner {
    responses: Mutex<HashMap<String, FakeResponse>>,
    queued: Mutex<HashMap<String, VecDeque<FakeResponse>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeRunner {
    /// Runner where every program fails to launch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls to programs whose stem is `stem`, builder style.
    #[must_use]
    pub fn on(self, stem: &str, response: FakeResponse) -> Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(stem.to_lowercase(), response);
        }
        self
    }

    /// Queue a one-shot answer for the next unanswered call to `stem`.
    #[must_use]
    pub fn then(self, stem: &str, response: FakeResponse) -> Self {
        if let Ok(mut queued) = self.queued.lock() {
            queued.entry(stem.to_lowercase()).or_default().push_back(response);
        }
        self
    }

    /// All calls so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls to programs whose stem is `stem`.
    #[must_use]
    pub fn calls_to(&self, stem: &str) -> Vec<RecordedCall> {
        let stem = stem.to_lowercase();
        self.calls().into_iter().filter(|c| c.stem() == stem).collect()
    }

    fn respond(
        &self,
        program: &Path,
        args: &[OsString],
        raw_tail: Option<&OsStr>,
        limit: Option<Duration>,
    ) -> Result<CommandOutput, UpdaterError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(RecordedCall {
                program: program.to_path_buf(),
                args: args.to_vec(),
                raw_tail: raw_tail.map(OsStr::to_os_string),
            });
        }

        let stem = program_stem(program);
        let queued = self.queued.lock().ok().and_then(|mut q| q.get_mut(&stem)?.pop_front());
        let response =
            queued.or_else(|| self.responses.lock().ok().and_then(|r| r.get(&stem).cloned()));

        match response {
            Some(FakeResponse::Output(output)) => Ok(output),
            Some(FakeResponse::Timeout) => Err(UpdaterError::ProcessTimeout {
                program: program.display().to_string(),
                seconds: limit.map_or(0, |l| l.as_secs()),
            }),
            Some(FakeResponse::LaunchFailure) | None => Err(UpdaterError::ProcessLaunchFailed {
                program: program.display().to_string(),
                reason: "program not found".to_string(),
            }),
        }
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(
        &self,
        program: &Path,
        args: &[OsString],
        limit: Option<Duration>,
    ) -> Result<CommandOutput, UpdaterError> {
        self.respond(program, args, None, limit)
    }

    async fn run_with_raw_tail(
        &self,
        program: &Path,
        args: &[OsString],
        tail: &OsStr,
        limit: Option<Duration>,
    ) -> Result<CommandOutput, UpdaterError> {
        self.respond(program, args, Some(tail), limit)
    }
}

/// [`SignatureInspector`] returning a fixed report.
#[derive(Debug)]
pub struct FakeInspector {
    report: SignatureReport,
    inspected: Mutex<Vec<PathBuf>>,
}

impl FakeInspector {
    /// Inspector returning `report` for every file.
    #[must_use]
    pub fn new(report: SignatureReport) -> Self {
        Self {
            report,
            inspected: Mutex::new(Vec::new()),
        }
    }

    /// Valid signature made with `key`.
    #[must_use]
    pub fn valid(key: &[u8]) -> Self {
        Self::new(SignatureReport {
            status: SignatureStatus::Valid,
            status_message: "Signature verified.".to_string(),
            subject: Some("CN=Electronic Frontier Foundation".to_string()),
            signer_public_key: Some(key.to_vec()),
        })
    }

    /// Report with `status` and no signer.
    #[must_use]
    pub fn with_status(status: SignatureStatus) -> Self {
        Self::new(SignatureReport {
            status,
            status_message: "Signature check failed.".to_string(),
            subject: None,
            signer_public_key: None,
        })
    }

    /// Files inspected so far.
    #[must_use]
    pub fn inspected(&self) -> Vec<PathBuf> {
        self.inspected.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SignatureInspector for FakeInspector {
    async fn inspect(&self, path: &Path) -> Result<SignatureReport, UpdaterError> {
        if let Ok(mut inspected) = self.inspected.lock() {
            inspected.push(path.to_path_buf());
        }
        Ok(self.report.clone())
    }
}
