use std::io::{self, BufRead};
use std::sync::mpsc;

use anyhow::{Context, Result};
use control::{ControlError, Controller};
use log::*;

mod battery;
mod command;
mod config;
mod logging;
mod service;
mod session;
mod shell;
mod status;
mod ticker;

use battery::BatterySensor;
use command::Request;
use config::Config;
use service::ThrottleService;
use session::SessionFile;
use shell::ShellStore;
use status::EventSender;

fn main() -> Result<()> {
    logging::init();

    let config = Config::read()?;
    info!("Starting with {:?}", config);

    // Nothing works without privileged access, so give up right away
    let store = ShellStore::acquire(&config.shell, config.layout.clone())
        .map_err(ControlError::PrivilegedAccessUnavailable)
        .context("Can't start kernel I/O, stopping")?;

    let (events, subscription) = mpsc::channel();
    let status_handler = status::subscribe(subscription, io::stdout())?;

    let controller = Controller::new(store, EventSender::new(events), config.controller);
    let mut service = ThrottleService::new(
        controller,
        BatterySensor::new(&config.battery_path),
        SessionFile::new(&config.session_path),
    );
    let result = serve(&mut service);

    service.shutdown();
    // The controller held the last sender, so the subscriber drains and exits
    if status_handler.join().is_err() {
        error!("Status subscriber panicked");
    }
    result
}

fn serve(service: &mut ThrottleService<ShellStore>) -> Result<()> {
    service.resume()?;

    for line in io::stdin().lock().lines() {
        let line = line.context("Failed to read control input")?;
        let request = match Request::parse(&line) {
            Ok(Some(request)) => request,
            Ok(None) => continue,
            Err(e) => {
                warn!("{:#}", e);
                continue;
            }
        };

        match request {
            Request::Control(command) => {
                info!("Received command {:?}", command);
                if let Err(e) = service.apply(command) {
                    error!("{:#}", e);
                }
                debug!("Controller state {:?}", service.state());
            }
            Request::Status => service.status().emit(&mut io::stdout().lock())?,
            Request::Quit => break,
        }
    }
    Ok(())
}
