//! Subprocess client for `docker-credential-*` helpers
//!
//! One helper process per operation: launch with the subcommand as the only
//! argument, write the payload to stdin, close it, then collect stdout,
//! stderr and the exit status. Nothing survives between calls.

use crate::error::{CredentialError, Result, StoreError};
use crate::record::Credentials;
use crate::{CredentialStore, PROGRAM_PREFIX};
use std::collections::{BTreeMap, HashMap};
use std::ffi::{OsStr, OsString};
use std::io::{self, Read, Write};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Helper output meaning "no such entry", whatever the exit code says
const NOT_FOUND_MARKER: &str = "credentials not found in native keychain";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Credential store backed by an external helper program
#[derive(Debug, Clone)]
pub struct HelperStore {
    program: String,
    exe: Option<PathBuf>,
    environment: HashMap<OsString, OsString>,
    timeout: Option<Duration>,
}

impl HelperStore {
    /// Store for `docker-credential-<program>`, inheriting the current environment
    pub fn new(program: &str) -> Self {
        Self::with_environment(program, std::iter::empty::<(OsString, OsString)>())
    }

    /// Like [`HelperStore::new`], with `overrides` layered over the current environment
    ///
    /// The executable is located once, here, using the `PATH` of the merged
    /// environment. A missing helper is not an error until an operation runs.
    pub fn with_environment<I, K, V>(program: &str, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut environment: HashMap<OsString, OsString> = std::env::vars_os().collect();
        environment.extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));

        let program = format!("{}{}", PROGRAM_PREFIX, program);
        let exe = resolve_executable(&program, &environment);
        match &exe {
            Some(path) => {
                debug!(program = %program, exe = %path.display(), "resolved credential helper")
            }
            None => warn!(
                program = %program,
                "credential helper not installed or not available in PATH"
            ),
        }

        Self {
            program,
            exe,
            environment,
            timeout: None,
        }
    }

    /// Kill the helper and fail with [`StoreError::Timeout`] if it runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Full program name, `docker-credential-<name>`
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Resolved executable path, if the helper was found
    pub fn executable(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.exe.is_some()
    }

    /// Run the helper with `subcommand`, feeding `input` on stdin
    fn execute(&self, subcommand: &str, input: Option<&[u8]>) -> Result<Vec<u8>> {
        let exe = self.exe.as_ref().ok_or_else(|| StoreError::NotInstalled {
            program: self.program.clone(),
        })?;

        debug!(program = %self.program, subcommand, "running credential helper");
        let mut command = Command::new(exe);
        if self.timeout.is_some() {
            // Own group so a timeout can take down the helper's children too.
            command.process_group(0);
        }
        let mut child = command
            .arg(subcommand)
            .env_clear()
            .envs(&self.environment)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| launch_error(&self.program, e))?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let (status, out, err) = thread::scope(|scope| {
            let writer = scope.spawn(move || feed(stdin, input));
            let out_reader = scope.spawn(move || drain(stdout));
            let err_reader = scope.spawn(move || drain(stderr));

            let status = self.wait(&mut child);
            let written = join(writer);
            let out = join(out_reader);
            let err = join(err_reader);

            let status = status?;
            let io_error = |source| StoreError::Io {
                program: self.program.clone(),
                source,
            };
            written.map_err(io_error)?;
            Ok::<_, StoreError>((status, out.map_err(io_error)?, err.map_err(io_error)?))
        })?;

        if status.success() {
            debug!(program = %self.program, subcommand, "credential helper succeeded");
            return Ok(out);
        }

        let failure = failure_error(&self.program, status.code(), &out, &err);
        debug!(
            program = %self.program,
            subcommand,
            exit_code = ?status.code(),
            error = %failure,
            "credential helper failed"
        );
        Err(failure)
    }

    fn wait(&self, child: &mut Child) -> std::result::Result<ExitStatus, StoreError> {
        let io_error = |source| StoreError::Io {
            program: self.program.clone(),
            source,
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(io_error);
        };

        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = child.try_wait().map_err(io_error)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                warn!(program = %self.program, ?timeout, "killing credential helper after timeout");
                kill_process_group(child);
                let _ = child.wait();
                return Err(StoreError::Timeout {
                    program: self.program.clone(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn parse<T: serde::de::DeserializeOwned>(&self, data: &[u8]) -> Result<T> {
        serde_json::from_slice(data).map_err(|source| {
            StoreError::MalformedOutput {
                program: self.program.clone(),
                source,
            }
            .into()
        })
    }
}

impl CredentialStore for HelperStore {
    fn get(&self, server: &str) -> Result<Credentials> {
        let data = self.execute("get", Some(server.as_bytes()))?;
        let credentials: Credentials = self.parse(&data)?;

        // Some helpers answer unknown servers with an empty record and exit 0.
        if credentials.is_empty() {
            return Err(CredentialError::NotFound {
                program: self.program.clone(),
            });
        }
        Ok(credentials)
    }

    fn store(&self, server: &str, username: &str, secret: &str) -> Result<()> {
        let record = Credentials::new(server, username, secret);
        let payload = serde_json::to_vec(&record).map_err(|source| StoreError::MalformedOutput {
            program: self.program.clone(),
            source,
        })?;
        self.execute("store", Some(&payload))?;
        Ok(())
    }

    fn erase(&self, server: &str) -> Result<()> {
        self.execute("erase", Some(server.as_bytes()))?;
        Ok(())
    }

    fn list(&self) -> Result<BTreeMap<String, String>> {
        let data = self.execute("list", None)?;
        self.parse(&data)
    }
}

/// SIGKILL the helper and anything it started while holding our pipes
fn kill_process_group(child: &mut Child) {
    let Ok(pgid) = libc::pid_t::try_from(child.id()) else {
        let _ = child.kill();
        return;
    };
    // The helper leads its own group, so -pgid reaches every descendant.
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result != 0 {
        debug!(error = %io::Error::last_os_error(), "process group kill failed");
        let _ = child.kill();
    }
}

fn resolve_executable(program: &str, environment: &HashMap<OsString, OsString>) -> Option<PathBuf> {
    let search_path = environment.get(OsStr::new("PATH"))?;
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    which::which_in(program, Some(search_path), cwd).ok()
}

fn feed(stdin: Option<std::process::ChildStdin>, input: Option<&[u8]>) -> io::Result<()> {
    let (Some(mut pipe), Some(data)) = (stdin, input) else {
        return Ok(());
    };
    match pipe.write_all(data) {
        // A helper that exits without reading its input is judged by its exit status.
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

fn drain<R: Read>(pipe: Option<R>) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, io::Result<T>>) -> io::Result<T> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("credential helper pipe thread panicked")))
}

/// Map a failed spawn onto the store's error taxonomy
fn launch_error(program: &str, err: io::Error) -> StoreError {
    if err.kind() == io::ErrorKind::NotFound {
        return StoreError::NotInstalled {
            program: program.to_string(),
        };
    }
    StoreError::Launch {
        program: program.to_string(),
        errno: err.raw_os_error().unwrap_or(0),
        message: err.to_string(),
    }
}

/// Map a non-zero exit onto the store's error taxonomy
///
/// Helpers report errors on stdout; stderr is used only when stdout is empty.
fn failure_error(
    program: &str,
    exit_code: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> CredentialError {
    let mut message = String::from_utf8_lossy(stdout).trim().to_string();
    if message.is_empty() {
        message = String::from_utf8_lossy(stderr).trim().to_string();
    }

    if message.contains(NOT_FOUND_MARKER) {
        return CredentialError::NotFound {
            program: program.to_string(),
        };
    }
    StoreError::HelperFailed {
        program: program.to_string(),
        exit_code,
        message,
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "docker-credential-test";

    #[test]
    fn test_enoent_at_launch_is_not_installed() {
        let err = launch_error(PROGRAM, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, StoreError::NotInstalled { .. }));
        assert!(err.to_string().contains("not installed"));
    }

    #[test]
    fn test_other_launch_errors_carry_errno() {
        let err = launch_error(PROGRAM, io::Error::from_raw_os_error(13));
        match err {
            StoreError::Launch { errno, message, .. } => {
                assert_eq!(errno, 13);
                assert!(!message.is_empty());
            }
            other => panic!("expected Launch, got {other:?}"),
        }
    }

    #[test]
    fn test_keychain_message_means_not_found() {
        let err =
            failure_error(PROGRAM, Some(1), b"credentials not found in native keychain\n", b"");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_failure_prefers_stdout() {
        let err = failure_error(PROGRAM, Some(2), b"  vault sealed \n", b"ignored");
        match err {
            CredentialError::Store(StoreError::HelperFailed {
                exit_code, message, ..
            }) => {
                assert_eq!(exit_code, Some(2));
                assert_eq!(message, "vault sealed");
            }
            other => panic!("expected HelperFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_failure_falls_back_to_stderr() {
        let err = failure_error(PROGRAM, Some(1), b"", b"permission denied\n");
        assert_eq!(
            err.to_string(),
            "Credentials store docker-credential-test exited with \"permission denied\"."
        );
    }

    #[test]
    fn test_missing_helper_fails_fast() {
        let empty = tempfile::TempDir::new().unwrap();
        let store =
            HelperStore::with_environment("surely-absent", [("PATH", empty.path().as_os_str())]);

        assert_eq!(store.program(), "docker-credential-surely-absent");
        assert!(!store.is_available());
        assert!(store.executable().is_none());

        let err = store.get("https://index.docker.io/v1/").unwrap_err();
        assert!(matches!(err, CredentialError::Store(StoreError::NotInstalled { .. })));
        assert!(err.to_string().contains("not installed"));
    }

    #[test]
    fn test_missing_path_variable_means_not_installed() {
        let mut environment = HashMap::new();
        environment.insert(OsString::from("HOME"), OsString::from("/tmp"));
        assert!(resolve_executable("docker-credential-anything", &environment).is_none());
    }
}
