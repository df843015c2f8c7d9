//! Hardware boundary: serial MCU link standing in for the out-of-scope
//! USB/UART transport and step/direction GPIO (`SPEC_FULL.md` §1a).
//!
//! Grounded on the teacher's `hardware/mod.rs` (serial MCU link, `thiserror`
//! error enum, connect/send/shutdown shape), generalized from "G-code over
//! serial" to "step/dir/enable frames over serial". The core never talks to
//! hardware directly; it emits events through the `StepperSink` trait,
//! which `HardwareManager` forwards.

use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::config::Config;
use crate::exec::stepper::{Direction, StepperEvent};

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("serial port error: {0}")]
    Serial(#[from] tokio_serial::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not connected to hardware")]
    NotConnected,
    #[error("timeout waiting for response")]
    Timeout,
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Output boundary for step/direction edges and enable transitions
/// (`SPEC_FULL.md` §6). Implemented by `HardwareManager`; a test double can
/// implement it to record events without a real serial port.
#[async_trait::async_trait]
pub trait StepperSink: Send {
    async fn dispatch(&mut self, events: &[StepperEvent]) -> Result<(), HardwareError>;
}

#[derive(Debug)]
pub struct HardwareManager {
    config: Config,
    serial: Option<SerialStream>,
    stats: CommandStats,
}

impl HardwareManager {
    pub fn new(config: Config) -> Self {
        Self { config, serial: None, stats: CommandStats::default() }
    }

    pub async fn connect(&mut self) -> Result<(), HardwareError> {
        tracing::info!(
            "connecting to MCU: {} at {} baud",
            self.config.mcu.serial,
            self.config.mcu.baud
        );
        let port = tokio_serial::new(&self.config.mcu.serial, self.config.mcu.baud)
            .timeout(Duration::from_millis(100))
            .open_native_async()?;
        self.serial = Some(port);
        tracing::info!("connected to MCU successfully");
        Ok(())
    }

    async fn send_frame(&mut self, frame: &str) -> Result<String, HardwareError> {
        use tokio::time::timeout;
        let Some(ref mut port) = self.serial else {
            return Err(HardwareError::NotConnected);
        };
        tracing::trace!("MCU <- {}", frame);
        let framed = format!("{}\n", frame);
        port.write_all(framed.as_bytes()).await?;
        port.flush().await?;
        self.stats.total_commands += 1;
        self.stats.last_command = Some(frame.to_string());

        let mut buf = vec![0u8; 256];
        let n = timeout(Duration::from_millis(500), port.read(&mut buf))
            .await
            .map_err(|_| HardwareError::Timeout)??;
        let response = String::from_utf8(buf[..n].to_vec())?.trim().to_string();
        tracing::trace!("MCU -> {}", response);
        if !response.starts_with("ok") {
            self.stats.failed_commands += 1;
        }
        Ok(response)
    }

    pub async fn initialize(&mut self) -> Result<(), HardwareError> {
        if self.serial.is_none() {
            self.connect().await?;
        }
        tracing::info!("initializing motor drivers");
        if let Err(e) = self.send_frame("RESET").await {
            tracing::warn!("reset frame failed: {}", e);
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
        for (name, motor) in self.config.motors.clone() {
            let frame = format!(
                "CONFIG motor={} axis={} microsteps={} steps_per_unit={:.4}",
                name,
                motor.axis,
                motor.microsteps,
                motor.steps_per_unit()
            );
            match self.send_frame(&frame).await {
                Ok(response) if !response.starts_with("ok") => {
                    tracing::warn!("motor {} config response: {}", name, response);
                }
                Err(e) => tracing::warn!("motor {} config failed: {}", name, e),
                _ => {}
            }
        }
        tracing::info!("hardware initialization complete");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), HardwareError> {
        tracing::info!("shutting down hardware");
        if let Some(ref mut port) = self.serial {
            let _ = port.write_all(b"SHUTDOWN\n").await;
            let _ = port.flush().await;
        }
        Ok(())
    }

    pub fn command_stats(&self) -> CommandStats {
        self.stats.clone()
    }
}

#[async_trait::async_trait]
impl StepperSink for HardwareManager {
    async fn dispatch(&mut self, events: &[StepperEvent]) -> Result<(), HardwareError> {
        for event in events {
            let frame = match event {
                StepperEvent::Step { motor } => format!("STEP motor={motor}"),
                StepperEvent::DirectionChange { motor, direction } => {
                    let d = match direction {
                        Direction::Positive => 1,
                        Direction::Negative => 0,
                    };
                    format!("DIR motor={motor} value={d}")
                }
                StepperEvent::PowerChange { motor, enabled } => {
                    format!("ENABLE motor={motor} value={}", *enabled as u8)
                }
            };
            if let Err(e) = self.send_frame(&frame).await {
                tracing::warn!("stepper frame {} failed: {}", frame, e);
            }
        }
        Ok(())
    }
}

/// Statistics for hardware frame dispatch.
#[derive(Debug, Clone, Default)]
pub struct CommandStats {
    pub total_commands: u64,
    pub failed_commands: u64,
    pub last_command: Option<String>,
}

impl Clone for HardwareManager {
    fn clone(&self) -> Self {
        Self { config: self.config.clone(), serial: None, stats: self.stats.clone() }
    }
}
