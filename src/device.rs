//! Device abstraction
//!
//! The chain never talks to a controller directly. Anything that can report
//! a pose, run an uploaded program and accept streamed instructions can sit
//! behind [`DeviceLink`]. Real controller transports live outside this crate.

use crate::cursor::InitialState;
use async_trait::async_trait;
use serde::Serialize;

#[async_trait]
pub trait DeviceLink: Send + Sync {
    /// Pose the controller reports right now, if it can tell
    async fn current_pose(&self) -> anyhow::Result<Option<InitialState>>;

    /// Whether a program is still executing on the controller
    async fn is_running(&self) -> anyhow::Result<bool>;

    /// Upload and start a complete program
    async fn run_program(&self, name: &str, program: &[String]) -> anyhow::Result<()>;

    /// Send one streamed instruction
    async fn send_instruction(&self, line: &str) -> anyhow::Result<()>;
}

/// Accepts everything and reports nothing
#[derive(Debug, Clone, Default)]
pub struct NoOpDevice;

#[async_trait]
impl DeviceLink for NoOpDevice {
    async fn current_pose(&self) -> anyhow::Result<Option<InitialState>> {
        Ok(None)
    }

    async fn is_running(&self) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn run_program(&self, _name: &str, _program: &[String]) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_instruction(&self, _line: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(Serialize)]
struct ProgramUpload<'a> {
    name: &'a str,
    program: &'a [String],
}

/// Prints uploaded programs and streamed instructions to stdout
#[derive(Debug, Clone)]
pub struct ConsoleDevice {
    pub pretty_print: bool,
}

impl ConsoleDevice {
    pub fn new() -> Self {
        Self { pretty_print: false }
    }

    pub fn pretty() -> Self {
        Self { pretty_print: true }
    }
}

impl Default for ConsoleDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceLink for ConsoleDevice {
    async fn current_pose(&self) -> anyhow::Result<Option<InitialState>> {
        Ok(None)
    }

    async fn is_running(&self) -> anyhow::Result<bool> {
        Ok(false)
    }

    async fn run_program(&self, name: &str, program: &[String]) -> anyhow::Result<()> {
        if self.pretty_print {
            println!("[PROGRAM {}]", name);
            for line in program {
                println!("{}", line);
            }
        } else {
            println!("[PROGRAM] {}", serde_json::to_string(&ProgramUpload { name, program })?);
        }
        Ok(())
    }

    async fn send_instruction(&self, line: &str) -> anyhow::Result<()> {
        println!("[STREAM] {}", line);
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records everything it receives; `running` can be toggled by tests
    #[derive(Debug, Default)]
    pub struct RecordingDevice {
        pub pose: Option<InitialState>,
        /// Delay before answering pose and running-state queries
        pub latency: Option<Duration>,
        pub running: AtomicBool,
        pub programs: Mutex<Vec<(String, Vec<String>)>>,
        pub instructions: Mutex<Vec<String>>,
    }

    impl RecordingDevice {
        pub fn set_running(&self, running: bool) {
            self.running.store(running, Ordering::SeqCst);
        }

        pub fn programs(&self) -> Vec<(String, Vec<String>)> {
            self.programs.lock().map(|p| p.clone()).unwrap_or_default()
        }

        pub fn instructions(&self) -> Vec<String> {
            self.instructions.lock().map(|i| i.clone()).unwrap_or_default()
        }

        async fn lag(&self) {
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
        }
    }

    #[async_trait]
    impl DeviceLink for RecordingDevice {
        async fn current_pose(&self) -> anyhow::Result<Option<InitialState>> {
            self.lag().await;
            Ok(self.pose)
        }

        async fn is_running(&self) -> anyhow::Result<bool> {
            self.lag().await;
            Ok(self.running.load(Ordering::SeqCst))
        }

        async fn run_program(&self, name: &str, program: &[String]) -> anyhow::Result<()> {
            if let Ok(mut programs) = self.programs.lock() {
                programs.push((name.to_string(), program.to_vec()));
            }
            Ok(())
        }

        async fn send_instruction(&self, line: &str) -> anyhow::Result<()> {
            if let Ok(mut instructions) = self.instructions.lock() {
                instructions.push(line.to_string());
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_device() {
        let device = NoOpDevice;
        assert!(device.current_pose().await.unwrap().is_none());
        assert!(!device.is_running().await.unwrap());
        device.run_program("p", &["line".to_string()]).await.unwrap();
        device.send_instruction("line").await.unwrap();
    }

    #[tokio::test]
    async fn test_console_device_accepts_programs() {
        let device = ConsoleDevice::pretty();
        device
            .run_program("Demo", &["MODULE Demo".to_string(), "ENDMODULE".to_string()])
            .await
            .unwrap();
        assert!(!ConsoleDevice::default().pretty_print);
    }
}
