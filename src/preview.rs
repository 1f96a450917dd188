//! Supervision of the observer-camera preview, an external long-lived process.
//!
//! The preview shares nothing with the projection pipeline except its stop
//! flag. A monitor thread polls the child for liveness; stopping asks the child
//! to terminate, waits out a grace period and then kills it.

use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::PreviewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewState {
    Starting,
    Running,
    StopRequested,
    Stopped,
    /// The process went away without being asked to.
    Exited,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

pub struct PreviewProcess {
    program: String,
    stop_flag: Arc<AtomicBool>,
    state: Arc<Mutex<PreviewState>>,
    child: Arc<Mutex<Option<Child>>>,
    monitor: Option<JoinHandle<()>>,
    poll_interval: Duration,
    grace_period: Duration,
}

impl PreviewProcess {
    pub fn start(
        command: &[String],
        poll_interval: Duration,
        grace_period: Duration,
    ) -> Result<PreviewProcess, PreviewError> {
        let (program, args) = command.split_first().ok_or(PreviewError::EmptyCommand)?;
        let state = Arc::new(Mutex::new(PreviewState::Starting));
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .spawn()
            .map_err(|source| PreviewError::Spawn {
                program: program.clone(),
                source,
            })?;
        log::info!("preview `{}` started (pid {})", program, child.id());

        let child = Arc::new(Mutex::new(Some(child)));
        let stop_flag = Arc::new(AtomicBool::new(false));
        *lock(&state) = PreviewState::Running;

        let monitor = {
            let child = Arc::clone(&child);
            let state = Arc::clone(&state);
            let stop_flag = Arc::clone(&stop_flag);
            let program = program.clone();
            std::thread::spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    {
                        let mut guard = lock(&child);
                        let exited = match guard.as_mut().map(|c| c.try_wait()) {
                            Some(Ok(Some(status))) => {
                                log::warn!("preview `{}` exited on its own: {}", program, status);
                                true
                            }
                            Some(Err(e)) => {
                                log::warn!("preview `{}` cannot be polled: {}", program, e);
                                true
                            }
                            Some(Ok(None)) => false,
                            None => true,
                        };
                        if exited {
                            *guard = None;
                            *lock(&state) = PreviewState::Exited;
                            return;
                        }
                    }
                    std::thread::sleep(poll_interval);
                }
            })
        };

        Ok(PreviewProcess {
            program: program.clone(),
            stop_flag,
            state,
            child,
            monitor: Some(monitor),
            poll_interval,
            grace_period,
        })
    }

    pub fn state(&self) -> PreviewState {
        *lock(&self.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == PreviewState::Running
    }

    /// Stop the preview. Idempotent.
    ///
    /// The child gets `grace_period` to exit after a terminate request before it
    /// is killed. The monitor thread gets the same bound to finish.
    pub fn stop(&mut self) -> Result<(), PreviewError> {
        {
            let mut state = lock(&self.state);
            if *state == PreviewState::Running || *state == PreviewState::Starting {
                *state = PreviewState::StopRequested;
            }
        }
        self.stop_flag.store(true, Ordering::Release);

        let mut result = Ok(());
        if let Some(monitor) = self.monitor.take() {
            let deadline = Instant::now() + self.grace_period.max(self.poll_interval * 2);
            while !monitor.is_finished() && Instant::now() < deadline {
                std::thread::sleep(Duration::from_millis(10));
            }
            if monitor.is_finished() {
                let _ = monitor.join();
            } else {
                log::warn!("preview monitor for `{}` did not finish", self.program);
                result = Err(PreviewError::SupervisorStuck);
            }
        }

        let terminated = self.terminate_child();
        let mut state = lock(&self.state);
        if *state != PreviewState::Exited {
            *state = PreviewState::Stopped;
        }
        result.and(terminated)
    }

    fn terminate_child(&self) -> Result<(), PreviewError> {
        let mut guard = lock(&self.child);
        let Some(mut child) = guard.take() else {
            return Ok(());
        };
        if let Ok(Some(_)) = child.try_wait() {
            return Ok(());
        }
        request_terminate(&child);
        let deadline = Instant::now() + self.grace_period;
        while Instant::now() < deadline {
            if let Ok(Some(status)) = child.try_wait() {
                log::info!("preview `{}` stopped: {}", self.program, status);
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        log::warn!(
            "preview `{}` ignored terminate for {:?}, killing",
            self.program,
            self.grace_period
        );
        child.kill().map_err(PreviewError::Kill)?;
        child.wait().map_err(PreviewError::Kill)?;
        Ok(())
    }
}

#[cfg(unix)]
fn request_terminate(child: &Child) {
    let status = Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        log::debug!("cannot send SIGTERM to {}: {}", child.id(), e);
    }
}

#[cfg(not(unix))]
fn request_terminate(_child: &Child) {}

impl Drop for PreviewProcess {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("preview teardown: {}", e);
        }
    }
}
