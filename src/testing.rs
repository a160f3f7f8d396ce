//! In-memory port fakes shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::context::ServiceContext;
use crate::ports::{
    Clock, FileSystem, HttpClient, HttpError, HttpResponse, IdGenerator, PortError, PortFuture,
    ShellExecutor, ShellOutput,
};

/// In-memory filesystem shared between a test and the context under test.
#[derive(Clone, Default)]
pub(crate) struct MemFs {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MemFs {
    pub(crate) fn with_file(self, path: &str, contents: &str) -> Self {
        self.put(path, contents);
        self
    }

    pub(crate) fn put(&self, path: &str, contents: &str) {
        self.files.lock().unwrap().insert(PathBuf::from(path), contents.to_string());
    }

    pub(crate) fn get(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(Path::new(path)).cloned()
    }
}

impl FileSystem for MemFs {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| format!("No such file: {}", path.display()).into())
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        self.files.lock().unwrap().insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.keys().any(|p| p == path || p.starts_with(path))
    }

    fn file_len(&self, path: &Path) -> Result<u64, PortError> {
        let contents = self.read_to_string(path)?;
        Ok(contents.len() as u64)
    }

    fn list_dir(&self, path: &Path) -> Result<Vec<String>, PortError> {
        let files = self.files.lock().unwrap();
        let mut entries: Vec<String> = files
            .keys()
            .filter_map(|p| p.strip_prefix(path).ok())
            .filter_map(|rest| rest.components().next())
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        entries.dedup();
        Ok(entries)
    }
}

/// Shell fake answering each command from a queue of scripted results.
///
/// Commands without a script succeed with empty output.
#[derive(Clone, Default)]
pub(crate) struct ScriptedShell {
    scripts: Arc<Mutex<HashMap<String, VecDeque<Result<ShellOutput, String>>>>>,
    calls: Arc<Mutex<Vec<(String, Duration)>>>,
}

impl ScriptedShell {
    pub(crate) fn respond(self, command: &str, result: Result<ShellOutput, String>) -> Self {
        self.scripts.lock().unwrap().entry(command.to_string()).or_default().push_back(result);
        self
    }

    pub(crate) fn calls(&self) -> Vec<(String, Duration)> {
        self.calls.lock().unwrap().clone()
    }
}

pub(crate) fn exited(code: i32, stdout: &str, stderr: &str) -> ShellOutput {
    ShellOutput {
        exit_code: code,
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        timed_out: false,
    }
}

pub(crate) fn timed_out(stdout: &str) -> ShellOutput {
    ShellOutput {
        exit_code: -1,
        stdout: stdout.to_string(),
        stderr: String::new(),
        timed_out: true,
    }
}

impl ShellExecutor for ScriptedShell {
    fn run<'a>(
        &'a self,
        command: &'a str,
        timeout: Duration,
    ) -> PortFuture<'a, Result<ShellOutput, PortError>> {
        self.calls.lock().unwrap().push((command.to_string(), timeout));
        let next = self.scripts.lock().unwrap().get_mut(command).and_then(VecDeque::pop_front);
        Box::pin(async move {
            match next {
                Some(Ok(output)) => Ok(output),
                Some(Err(msg)) => Err(msg.into()),
                None => Ok(exited(0, "", "")),
            }
        })
    }
}

/// HTTP fake returning a fixed result per URL; unknown URLs are refused.
#[derive(Clone, Default)]
pub(crate) struct ScriptedHttp {
    routes: Arc<Mutex<HashMap<String, Result<u16, ()>>>>,
}

impl ScriptedHttp {
    pub(crate) fn status(self, url: &str, status: u16) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), Ok(status));
        self
    }

    pub(crate) fn hang(self, url: &str) -> Self {
        self.routes.lock().unwrap().insert(url.to_string(), Err(()));
        self
    }
}

impl HttpClient for ScriptedHttp {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> PortFuture<'a, Result<HttpResponse, HttpError>> {
        let route = self.routes.lock().unwrap().get(url).copied();
        Box::pin(async move {
            match route {
                Some(Ok(status)) => Ok(HttpResponse { status, body: format!("status {status}") }),
                Some(Err(())) => Err(HttpError::Timeout(timeout)),
                None => Err(HttpError::Request("connection refused".into())),
            }
        })
    }
}

/// Clock frozen at a fixed instant.
pub(crate) struct FixedClock(pub DateTime<Utc>);

impl Default for FixedClock {
    fn default() -> Self {
        Self(Utc.with_ymd_and_hms(2025, 3, 15, 14, 30, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Deterministic `task-1`, `task-2`, ... identifiers.
#[derive(Default)]
pub(crate) struct SequentialIds(AtomicU64);

impl IdGenerator for SequentialIds {
    fn generate_id(&self) -> String {
        format!("task-{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Builds a context from fakes; the returned handles stay connected to it.
pub(crate) fn fake_context(
    fs: MemFs,
    shell: ScriptedShell,
    http: ScriptedHttp,
) -> Arc<ServiceContext> {
    Arc::new(ServiceContext {
        clock: Box::new(FixedClock::default()),
        fs: Box::new(fs),
        shell: Box::new(shell),
        http: Box::new(http),
        id_gen: Box::new(SequentialIds::default()),
    })
}
