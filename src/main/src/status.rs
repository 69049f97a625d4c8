use std::io::Write;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use anyhow::Result;
use control::{ControllerEvent, ControllerState, EventSink, KernelStatus, Temperature, UiUpdate};
use log::*;
use serde::Serialize;
use time::OffsetDateTime;

/// One line of machine-readable output for the UI.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum StatusEvent {
    #[serde(rename_all = "camelCase")]
    Temperatures {
        at: OffsetDateTime,
        #[serde(flatten)]
        update: UiUpdate,
    },
    #[serde(rename_all = "camelCase")]
    Fault { at: OffsetDateTime, message: String },
    #[serde(rename_all = "camelCase")]
    Status {
        at: OffsetDateTime,
        enabled: bool,
        max_temperature: Temperature,
        injection_probability: u32,
        kernel_injection_enabled: Option<bool>,
        kernel_injection_probability: Option<u32>,
    },
}

impl From<ControllerEvent> for StatusEvent {
    fn from(event: ControllerEvent) -> StatusEvent {
        let at = OffsetDateTime::now_utc();
        match event {
            ControllerEvent::Temperatures(update) => StatusEvent::Temperatures { at, update },
            ControllerEvent::Fault(error) => StatusEvent::Fault {
                at,
                message: error.to_string(),
            },
        }
    }
}

impl StatusEvent {
    pub fn status(
        state: ControllerState,
        max_temperature: Temperature,
        kernel: KernelStatus,
    ) -> Self {
        StatusEvent::Status {
            at: OffsetDateTime::now_utc(),
            enabled: state.enabled(),
            max_temperature,
            injection_probability: state.injection_probability.into(),
            kernel_injection_enabled: kernel.injection_enabled,
            kernel_injection_probability: kernel.injection_probability.map(u32::from),
        }
    }

    pub fn emit(&self, out: &mut impl Write) -> Result<()> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        // One write per line so concurrent emitters don't interleave
        out.write_all(&line)?;
        out.flush()?;
        Ok(())
    }
}

/// Posts controller events to the status subscriber.
#[derive(Debug, Clone)]
pub struct EventSender(Sender<ControllerEvent>);

impl EventSender {
    pub fn new(sender: Sender<ControllerEvent>) -> Self {
        Self(sender)
    }
}

impl EventSink for EventSender {
    fn post(&self, event: ControllerEvent) {
        if self.0.send(event).is_err() {
            debug!("Status subscriber is gone, dropping event");
        }
    }
}

/// Forwards events to `out` until every sender has been dropped.
pub fn subscribe<W>(events: Receiver<ControllerEvent>, mut out: W) -> Result<JoinHandle<()>>
where
    W: Write + Send + 'static,
{
    let handle = thread::Builder::new()
        .name("status".into())
        .spawn(move || {
            for event in events {
                if let ControllerEvent::Fault(error) = &event {
                    error!("{}", error);
                }
                let status = StatusEvent::from(event);
                if let Err(e) = status.emit(&mut out) {
                    warn!("Failed to deliver status update: {}", e);
                }
            }
            debug!("Status subscriber finished");
        })?;
    Ok(handle)
}
