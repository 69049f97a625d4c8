use crate::error::ControlError;
use crate::state::UiUpdate;

#[derive(Debug)]
pub enum ControllerEvent {
    /// Posted once per tick with the temperatures that drove it
    Temperatures(UiUpdate),
    /// A failure the operator should hear about; the controller keeps going
    Fault(ControlError),
}

/// Receiver of controller events. Posting is fire-and-forget.
pub trait EventSink: Send {
    fn post(&self, event: ControllerEvent);
}
