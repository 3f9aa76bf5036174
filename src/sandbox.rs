//! The boundary between the engine and the code under test.
//!
//! A [`Sandbox`] turns one property evaluation into a [`TestOutcome`] value no
//! matter how the evaluation ends. Two implementations are provided:
//!
//! * [`InProcess`] runs the property on the calling thread and traps panics.
//!   Cheap, but a property that aborts the process or loops forever takes the
//!   runner down with it.
//! * [`Subprocess`] sends the input to a worker process (see
//!   [`crate::worker`]) and maps signals, abnormal exits and, when a timeout
//!   is configured, hangs to outcomes.

use std::any::Any;
use std::cell::Cell;
use std::ffi::OsString;
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{SandboxError, UsageError};
use crate::outcome::{Fault, TestOutcome};
use crate::property::Property;
use crate::worker::{WorkerReply, WorkerRequest};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

static QUIET_HOOK: Once = Once::new();

thread_local! {
    static EVALUATING: Cell<bool> = Cell::new(false);
}

pub trait Sandbox<T> {
    /// Evaluate the property on `input`. Never panics because the property
    /// did.
    fn evaluate(&mut self, input: &T) -> TestOutcome;
}

impl<T, S: Sandbox<T> + ?Sized> Sandbox<T> for &mut S {
    fn evaluate(&mut self, input: &T) -> TestOutcome {
        (**self).evaluate(input)
    }
}

/// Best-effort rendering of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else if let Some(err) = payload.downcast_ref::<UsageError>() {
        err.to_string()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// Chain a panic hook that stays silent while a property is being evaluated
/// on this thread. Those panics are reported as outcomes.
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !EVALUATING.with(Cell::get) {
                previous(info);
            }
        }));
    });
}

/// Run `property` on `input`, converting a panic into a crashed outcome.
///
/// A [`UsageError`] panic payload becomes [`TestOutcome::Misused`].
pub fn run_guarded<T: 'static>(property: &Property<T>, input: &T) -> TestOutcome {
    install_quiet_hook();
    let outer = EVALUATING.with(|flag| flag.replace(true));
    let result = catch_unwind(AssertUnwindSafe(|| property.check(input)));
    EVALUATING.with(|flag| flag.set(outer));

    match result {
        Ok(Ok(())) => TestOutcome::Pass,
        Ok(Err(reason)) => TestOutcome::Counterexample(reason),
        Err(payload) => match payload.downcast_ref::<UsageError>() {
            Some(err) => {
                log::error!("SANDBOX: property `{}` misused the result model: {}", property.name(), err);
                TestOutcome::Misused(*err)
            }
            None => {
                let message = panic_message(payload.as_ref());
                log::debug!("SANDBOX: property `{}` panicked: {}", property.name(), message);
                TestOutcome::Crashed(Fault::panic(message))
            }
        },
    }
}

/// Evaluates properties on the current thread.
#[derive(Debug, Clone)]
pub struct InProcess<T> {
    property: Property<T>,
}

impl<T: 'static> InProcess<T> {
    pub fn new(property: Property<T>) -> Self {
        InProcess { property }
    }

    pub fn property(&self) -> &Property<T> {
        &self.property
    }
}

impl<T: 'static> Sandbox<T> for InProcess<T> {
    fn evaluate(&mut self, input: &T) -> TestOutcome {
        run_guarded(&self.property, input)
    }
}

/// Evaluates a named property in a fresh worker process per input.
#[derive(Debug, Clone)]
pub struct Subprocess<T> {
    program: PathBuf,
    args: Vec<OsString>,
    property: String,
    timeout: Option<Duration>,
    _input: PhantomData<fn(&T)>,
}

impl<T: Serialize> Subprocess<T> {
    pub fn new(program: impl Into<PathBuf>, property: impl Into<String>) -> Self {
        Subprocess {
            program: program.into(),
            args: Vec::new(),
            property: property.into(),
            timeout: None,
            _input: PhantomData,
        }
    }

    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kill the worker and report [`TestOutcome::TimedOut`] if it has not
    /// exited after `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn run(&self, input: &T) -> Result<TestOutcome, SandboxError> {
        let request = WorkerRequest {
            property: self.property.clone(),
            input: serde_json::to_value(input).map_err(SandboxError::Encode)?,
        };
        let payload = serde_json::to_vec(&request).map_err(SandboxError::Encode)?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Feed stdin from a thread so a worker that never reads cannot block
        // us past the deadline.
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || match stdin.write_all(&payload) {
                Err(err) if err.kind() != io::ErrorKind::BrokenPipe => Err(err),
                _ => Ok(()),
            })
        });
        let stdout = spawn_reader(child.stdout.take());
        let stderr = spawn_reader(child.stderr.take());

        let status = match self.wait(&mut child)? {
            Some(status) => status,
            None => {
                let limit = self.timeout.unwrap_or_default();
                log::warn!("SANDBOX: worker for `{}` timed out after {:?}", self.property, limit);
                return Ok(TestOutcome::TimedOut(limit));
            }
        };

        if let Some(writer) = writer {
            join_io(writer)?;
        }
        let stdout = collect(stdout)?;
        let stderr = collect(stderr)?;
        classify(status, &stdout, &stderr)
    }

    /// `None` means the worker was killed at the deadline.
    fn wait(&self, child: &mut Child) -> Result<Option<ExitStatus>, SandboxError> {
        let Some(limit) = self.timeout else {
            return Ok(Some(child.wait()?));
        };
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status));
            }
            if Instant::now() >= deadline {
                // the child may exit between the two checks; kill then fails
                // harmlessly and wait still reaps it
                let _ = child.kill();
                child.wait()?;
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

impl<T: Serialize> Sandbox<T> for Subprocess<T> {
    fn evaluate(&mut self, input: &T) -> TestOutcome {
        match self.run(input) {
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!("SANDBOX: {}", err);
                TestOutcome::Crashed(Fault::protocol(err.to_string()))
            }
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<io::Result<Vec<u8>>>> {
    source.map(|mut source| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            source.read_to_end(&mut buffer)?;
            Ok(buffer)
        })
    })
}

fn join_io<V>(handle: JoinHandle<io::Result<V>>) -> Result<V, SandboxError> {
    match handle.join() {
        Ok(result) => Ok(result?),
        Err(_) => Err(SandboxError::Io(io::Error::new(io::ErrorKind::Other, "pipe thread panicked"))),
    }
}

fn collect(handle: Option<JoinHandle<io::Result<Vec<u8>>>>) -> Result<Vec<u8>, SandboxError> {
    match handle {
        Some(handle) => join_io(handle),
        None => Ok(Vec::new()),
    }
}

fn last_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn classify(status: ExitStatus, stdout: &[u8], stderr: &[u8]) -> Result<TestOutcome, SandboxError> {
    if status.success() {
        let reply: WorkerReply = serde_json::from_slice(stdout).map_err(SandboxError::Decode)?;
        return Ok(reply.outcome);
    }
    let detail = last_line(stderr);
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return Ok(TestOutcome::Crashed(Fault::signal(signal, detail)));
        }
    }
    Ok(match status.code() {
        Some(code) => TestOutcome::Crashed(Fault::exit(code, detail)),
        None => TestOutcome::Crashed(Fault::protocol(format!("worker terminated abnormally: {}", detail))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_guarded_maps_verdicts() {
        let positive = Property::predicate("positive", |n: &i64| *n > 0);
        assert_eq!(run_guarded(&positive, &1), TestOutcome::Pass);
        assert_eq!(
            run_guarded(&positive, &0),
            TestOutcome::Counterexample("positive does not hold".to_string())
        );
    }

    #[test]
    fn test_in_process_traps_panics() {
        let mut sandbox = InProcess::new(Property::new("boom", |n: &usize| {
            let items = vec![0u8; 2];
            let _ = items[*n];
            Ok(())
        }));
        assert_eq!(sandbox.evaluate(&1), TestOutcome::Pass);
        match sandbox.evaluate(&5) {
            TestOutcome::Crashed(fault) => {
                assert_eq!(fault.kind, crate::outcome::FaultKind::Panic);
                assert!(fault.detail.contains("index out of bounds"), "{}", fault.detail);
            }
            other => panic!("expected a crash, got {:?}", other),
        }
    }

    #[test]
    fn test_usage_error_is_not_a_crash() {
        let misuse = Property::new("misuse", |_: &u8| -> crate::property::Verdict {
            panic::panic_any(UsageError::WildcardInActual)
        });
        assert_eq!(run_guarded(&misuse, &0), TestOutcome::Misused(UsageError::WildcardInActual));
    }

    #[test]
    fn test_hook_is_quiet_only_during_evaluation() {
        let boom = Property::new("boom", |_: &u8| -> crate::property::Verdict { panic!("boom") });
        assert!(matches!(run_guarded(&boom, &0), TestOutcome::Crashed(_)));
        assert!(!EVALUATING.with(Cell::get));
    }

    #[test]
    fn test_panic_message_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42u32), "panic with a non-string payload");
        assert_eq!(
            panic_message(&UsageError::TypeOnlyInActual),
            "type-only pattern is only allowed on the expected side of a comparison"
        );
    }

    #[test]
    fn test_last_line_skips_blank_lines() {
        assert_eq!(last_line(b"first\nsecond\n\n  \n"), "second");
        assert_eq!(last_line(b""), "");
    }
}
