//! Child process runner
//!
//! Output is drained on two scoped threads, one per stream, so a child
//! filling one pipe never blocks on the other. Both readers are joined
//! before the exit status is inspected. The wait loop polls the cancellation
//! token and kills the child when it is set.
//!
//! On unix the child leads its own process group and cancellation kills the
//! whole group, so commands started by a script do not keep the output
//! pipes open after the script itself is gone.

use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use schemata_core::{Cancellation, Error, Result};

/// Interval between exit / cancellation checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Captured result of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit status (always success when returned from [`run_process`])
    pub status: ExitStatus,
    /// Standard output lines
    pub stdout: Vec<String>,
    /// Standard error lines
    pub stderr: Vec<String>,
}

/// Run `command` to completion, feeding `input` on stdin
///
/// Stdout lines are logged at info and stderr lines at warn, both tagged
/// with `label`. A non-zero exit fails with `Execution`; cancellation kills
/// the child and fails with `Interrupted`.
pub fn run_process(
    mut command: Command,
    input: Option<&[u8]>,
    label: &str,
    cancellation: &Cancellation,
) -> Result<ProcessOutput> {
    cancellation.check(label)?;
    command
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    debug!(target: "schemata::process", label, ?command, "Spawning");
    let mut child = command
        .spawn()
        .map_err(|e| Error::Execution(format!("{}: failed to start {:?}: {}", label, command, e)))?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (status, stdout, stderr) = thread::scope(|scope| {
        let writer = scope.spawn(move || -> std::io::Result<()> {
            if let (Some(mut pipe), Some(bytes)) = (stdin, input) {
                pipe.write_all(bytes)?;
            }
            Ok(())
        });
        let out_reader = scope.spawn(move || read_lines(stdout, |line| {
            info!(target: "schemata::process", label, "{}", line)
        }));
        let err_reader = scope.spawn(move || read_lines(stderr, |line| {
            warn!(target: "schemata::process", label, "{}", line)
        }));

        let status = wait(&mut child, label, cancellation);

        let written = writer.join().map_err(|_| Error::Internal("stdin writer panicked".into()))?;
        let stdout = out_reader
            .join()
            .map_err(|_| Error::Internal("stdout reader panicked".into()))?;
        let stderr = err_reader
            .join()
            .map_err(|_| Error::Internal("stderr reader panicked".into()))?;
        let status = status?;
        if let Err(e) = written {
            // A child that exits without reading its input closes the pipe
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(Error::Io(e));
            }
        }
        Ok::<_, Error>((status, stdout?, stderr?))
    })?;

    if !status.success() {
        let detail = stderr
            .iter()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(|line| format!(": {}", line.trim()))
            .unwrap_or_default();
        return Err(Error::Execution(format!("{} exited with {}{}", label, status, detail)));
    }
    Ok(ProcessOutput {
        status,
        stdout,
        stderr,
    })
}

fn wait(child: &mut Child, label: &str, cancellation: &Cancellation) -> Result<ExitStatus> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if cancellation.is_cancelled() {
            warn!(target: "schemata::process", label, "Cancelled, killing child");
            kill_group(child);
            let _ = child.wait();
            return Err(Error::Interrupted(format!("{} was cancelled", label)));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    // The child was spawned with process_group(0), so its pid is the group id
    if let Ok(pgid) = libc::pid_t::try_from(child.id()) {
        // SAFETY: kill only delivers a signal and touches no memory
        unsafe {
            libc::kill(-pgid, libc::SIGKILL);
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn read_lines<R: Read>(stream: Option<R>, log: impl Fn(&str)) -> Result<Vec<String>> {
    let Some(stream) = stream else {
        return Ok(Vec::new());
    };
    let mut lines = Vec::new();
    for line in BufReader::new(stream).lines() {
        let line = line?;
        log(&line);
        lines.push(line);
    }
    Ok(lines)
}
