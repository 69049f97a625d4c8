use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};
use control::{Controller, ControllerState, ParameterStore, Temperature};
use log::*;

use crate::battery::BatterySensor;
use crate::command::ControlCommand;
use crate::session::{Session, SessionFile};
use crate::status::{EventSender, StatusEvent};
use crate::ticker::Ticker;

type SharedController<S> = Arc<Mutex<Controller<S, EventSender>>>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ties the controller to its periodic trigger and the saved session.
pub struct ThrottleService<S: ParameterStore + 'static> {
    controller: SharedController<S>,
    battery: BatterySensor,
    session: SessionFile,
    ticker: Option<Ticker>,
}

impl<S: ParameterStore + 'static> ThrottleService<S> {
    pub fn new(
        controller: Controller<S, EventSender>,
        battery: BatterySensor,
        session: SessionFile,
    ) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
            battery,
            session,
            ticker: None,
        }
    }

    /// Picks up where the previous run left off. Call once at start-up.
    pub fn resume(&mut self) -> Result<()> {
        let session = self.session.load();
        if session.enabled {
            info!(
                "Resuming temperature control at {} degrees",
                session.max_temperature.0
            );
            if let Err(e) = self.start(session.max_temperature) {
                warn!("Not resuming saved session: {:#}", e);
            }
        }
        Ok(())
    }

    pub fn apply(&mut self, command: ControlCommand) -> Result<()> {
        if command.enabled {
            self.start(command.max_temperature)
        } else {
            self.stop();
            Ok(())
        }
    }

    pub fn start(&mut self, threshold: Temperature) -> Result<()> {
        self.cancel_ticker();

        let interval = {
            let mut controller = lock(&self.controller);
            controller
                .start(threshold)
                .context("Can't start temperature controller")?;
            controller.config().tick_interval
        };
        let controller = Arc::clone(&self.controller);
        let battery = self.battery.clone();
        let ticker = Ticker::every(interval, move || {
            let battery_temperature = battery.read();
            if let Some(report) = lock(&controller).tick(battery_temperature) {
                debug!("Tick finished: {:?}", report);
            }
        });

        match ticker {
            Ok(ticker) => {
                self.ticker = Some(ticker);
                self.persist(Session {
                    enabled: true,
                    max_temperature: threshold,
                });
                Ok(())
            }
            Err(e) => {
                lock(&self.controller).stop();
                Err(e.context("Can't schedule control ticks"))
            }
        }
    }

    pub fn stop(&mut self) {
        // The tick thread takes the lock too, so it must be gone first
        self.cancel_ticker();

        let threshold = {
            let mut controller = lock(&self.controller);
            controller.stop();
            controller.config().max_temperature
        };
        self.persist(Session {
            enabled: false,
            max_temperature: threshold,
        });
    }

    pub fn state(&self) -> ControllerState {
        lock(&self.controller).state()
    }

    pub fn status(&self) -> StatusEvent {
        let mut controller = lock(&self.controller);
        let kernel = controller.kernel_status();
        StatusEvent::status(
            controller.state(),
            controller.config().max_temperature,
            kernel,
        )
    }

    /// Stops ticking, switches injection off and gives up privileged access.
    /// The saved session is left alone so the next start resumes.
    pub fn shutdown(mut self) {
        self.cancel_ticker();

        let mut controller = lock(&self.controller);
        controller.stop();
        controller.release();
        info!("Temperature controller shut down");
    }

    fn switch_off(&mut self) {
        self.cancel_ticker();
        lock(&self.controller).stop();
    }

    fn cancel_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.cancel();
        }
    }

    fn persist(&self, session: Session) {
        if let Err(e) = self.session.save(&session) {
            warn!("Failed to save session: {:#}", e);
        }
    }
}

// Never leave the kernel injecting with nobody driving it
impl<S: ParameterStore + 'static> Drop for ThrottleService<S> {
    fn drop(&mut self) {
        self.switch_off();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use control::{ControllerConfig, InjectionProbability, StoreError};
    use core::time::Duration;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::mpsc;
    use std::time::Instant;
    use tempfile::TempDir;

    #[derive(Clone, Default)]
    struct MemoryStore {
        values: Arc<Mutex<HashMap<String, String>>>,
        released: Arc<Mutex<bool>>,
    }

    impl MemoryStore {
        fn get(&self, key: &str) -> Option<String> {
            self.values.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: &str) {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
        }
    }

    impl ParameterStore for MemoryStore {
        fn read(&mut self, key: &str) -> Result<String, StoreError> {
            if *self.released.lock().unwrap() {
                return Err(StoreError::Released);
            }
            self.get(key)
                .ok_or_else(|| StoreError::CommandFailed { status: "1".into() })
        }

        fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
            if *self.released.lock().unwrap() {
                return Err(StoreError::Released);
            }
            self.set(key, value);
            Ok(())
        }

        fn release(&mut self) {
            *self.released.lock().unwrap() = true;
        }
    }

    fn service(store: &MemoryStore, dir: &TempDir) -> ThrottleService<MemoryStore> {
        let (tx, _rx) = mpsc::channel();
        let config = ControllerConfig {
            tick_interval: Duration::from_secs(3600),
            ..ControllerConfig::default()
        };
        let controller = Controller::new(store.clone(), EventSender::new(tx), config);
        ThrottleService::new(
            controller,
            BatterySensor::new(dir.path().join("battery")),
            SessionFile::new(dir.path().join("session.json")),
        )
    }

    fn wait_for(store: &MemoryStore, key: &str, value: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while store.get(key).as_deref() != Some(value) {
            assert!(Instant::now() < deadline, "{} never became {}", key, value);
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_start_ticks_immediately_and_stop_resets() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        store.set("cpu-temperature", "70");
        let mut service = service(&store, &dir);

        service.start(Temperature::new(60)).unwrap();
        assert_eq!(store.get("injection-enabled").as_deref(), Some("1"));
        wait_for(&store, "injection-probability", "1");

        service.stop();
        let state = service.state();
        assert!(!state.enabled());
        assert_eq!(state.injection_probability, InjectionProbability::OFF);
        assert_eq!(store.get("injection-enabled").as_deref(), Some("0"));
    }

    #[test]
    fn test_start_and_stop_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let mut service = service(&store, &dir);
        let session = SessionFile::new(dir.path().join("session.json"));

        service
            .apply(ControlCommand {
                enabled: true,
                max_temperature: Temperature::new(52),
            })
            .unwrap();
        assert_eq!(
            session.load(),
            Session {
                enabled: true,
                max_temperature: Temperature::new(52)
            }
        );

        service
            .apply(ControlCommand {
                enabled: false,
                max_temperature: Temperature::new(52),
            })
            .unwrap();
        assert_eq!(
            session.load(),
            Session {
                enabled: false,
                max_temperature: Temperature::new(52)
            }
        );
    }

    #[test]
    fn test_resume_starts_saved_session() {
        let dir = tempfile::tempdir().unwrap();
        SessionFile::new(dir.path().join("session.json"))
            .save(&Session {
                enabled: true,
                max_temperature: Temperature::new(45),
            })
            .unwrap();
        let store = MemoryStore::default();
        store.set("cpu-temperature", "50");
        let mut service = service(&store, &dir);

        service.resume().unwrap();
        assert!(service.state().enabled());
        wait_for(&store, "injection-probability", "1");
        service.stop();
    }

    #[test]
    fn test_resume_without_session_stays_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let mut service = service(&store, &dir);

        service.resume().unwrap();
        assert!(!service.state().enabled());
        assert_eq!(store.get("injection-enabled"), None);
    }

    #[test]
    fn test_resume_with_out_of_range_threshold_stays_stopped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("session.json"),
            r#"{"enabled":true,"maxTemperature":150}"#,
        )
        .unwrap();
        let store = MemoryStore::default();
        let mut service = service(&store, &dir);

        assert!(service.resume().is_ok());
        assert!(!service.state().enabled());
        assert_eq!(store.get("injection-enabled"), None);
    }

    #[test]
    fn test_dropping_service_switches_injection_off() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let mut service = service(&store, &dir);

        service.start(Temperature::new(60)).unwrap();
        assert_eq!(store.get("injection-enabled").as_deref(), Some("1"));
        drop(service);

        assert_eq!(store.get("injection-enabled").as_deref(), Some("0"));
    }

    #[test]
    fn test_invalid_threshold_keeps_service_stopped() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let mut service = service(&store, &dir);

        assert!(service.start(Temperature::new(250)).is_err());
        assert!(!service.state().enabled());
        assert!(!dir.path().join("session.json").exists());
    }

    #[test]
    fn test_shutdown_releases_store_but_keeps_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        let mut service = service(&store, &dir);

        service.start(Temperature::new(60)).unwrap();
        service.shutdown();

        assert!(*store.released.lock().unwrap());
        assert_eq!(store.get("injection-enabled").as_deref(), Some("0"));
        let session = SessionFile::new(dir.path().join("session.json")).load();
        assert!(session.enabled);
    }

    #[test]
    fn test_status_reports_kernel_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = MemoryStore::default();
        store.set("injection-enabled", "1");
        store.set("injection-probability", "8");
        let service = service(&store, &dir);

        let StatusEvent::Status {
            enabled,
            kernel_injection_enabled,
            kernel_injection_probability,
            ..
        } = service.status()
        else {
            panic!("expected a status event");
        };
        assert!(!enabled);
        assert_eq!(kernel_injection_enabled, Some(true));
        assert_eq!(kernel_injection_probability, Some(8));
    }
}
