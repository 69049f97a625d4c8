use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

use control::{Parameter, ParameterStore, StoreError};
use log::*;

// Printed after every command, followed by the command's exit status
const STATUS_MARKER: &str = "__cputemp_status__";

#[derive(Debug, Clone)]
pub struct ShellConfig {
    // Program that hands out a privileged shell, normally `su`
    pub program: String,
    // Refuse a shell that does not run as uid 0
    pub require_root: bool,
}

/// Where each conceptual parameter lives on this device.
#[derive(Debug, Clone)]
pub struct SysfsLayout {
    pub injection_enabled: PathBuf,
    pub injection_probability: PathBuf,
    pub cpu_temperature: PathBuf,
}

impl SysfsLayout {
    fn path(&self, key: &str) -> Result<&Path, StoreError> {
        let parameter = Parameter::ALL
            .into_iter()
            .find(|p| p.key() == key)
            .ok_or_else(|| StoreError::UnknownKey(key.to_string()))?;
        let path = match parameter {
            Parameter::InjectionEnabled => &self.injection_enabled,
            Parameter::InjectionProbability => &self.injection_probability,
            Parameter::CpuTemperature => &self.cpu_temperature,
        };
        Ok(path)
    }
}

struct CommandOutput {
    status: String,
    last_line: Option<String>,
}

struct Shell {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Shell {
    fn spawn(program: &str) -> io::Result<Shell> {
        let mut child = Command::new(program)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("shell stdin not captured"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("shell stdout not captured"))?;
        Ok(Shell {
            child,
            stdin,
            stdout: BufReader::new(stdout),
        })
    }

    fn run(&mut self, command: &str) -> io::Result<CommandOutput> {
        // The leading newline keeps the marker on its own line when the
        // command output does not end with one.
        writeln!(
            self.stdin,
            "{command} 2>/dev/null; printf '\\n{STATUS_MARKER} %d\\n' $?"
        )?;
        self.stdin.flush()?;

        let mut last_line = None;
        loop {
            let mut line = String::new();
            if self.stdout.read_line(&mut line)? == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "privileged shell closed its output",
                ));
            }
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(status) = line.strip_prefix(STATUS_MARKER) {
                return Ok(CommandOutput {
                    status: status.trim().to_string(),
                    last_line,
                });
            }
            if !line.is_empty() {
                last_line = Some(line.to_string());
            }
        }
    }

    fn close(mut self) {
        let _ = writeln!(self.stdin, "exit");
        drop(self.stdin);
        if let Err(e) = self.child.wait() {
            error!("Can't close privileged shell: {}", e);
        }
    }
}

enum Channel {
    Open(Shell),
    Lost,
    Released,
}

/// Parameter store backed by a long-lived privileged shell.
///
/// Reads run `cat`, writes run `echo value > path`. A command succeeded
/// when the exit status echoed after it is `0`.
pub struct ShellStore {
    channel: Channel,
    layout: SysfsLayout,
}

impl ShellStore {
    pub fn acquire(config: &ShellConfig, layout: SysfsLayout) -> Result<ShellStore, StoreError> {
        let unavailable = |reason: String| StoreError::Unavailable(reason);

        let mut shell = Shell::spawn(&config.program)
            .map_err(|e| unavailable(format!("can't start '{}': {}", config.program, e)))?;

        if let Err(reason) = check_access(&mut shell, config.require_root) {
            shell.close();
            return Err(unavailable(reason));
        }

        info!("Privileged shell '{}' acquired", config.program);
        Ok(ShellStore {
            channel: Channel::Open(shell),
            layout,
        })
    }

    fn run(&mut self, command: &str) -> Result<CommandOutput, StoreError> {
        let shell = match &mut self.channel {
            Channel::Open(shell) => shell,
            Channel::Lost => {
                return Err(StoreError::Unavailable("privileged shell exited".into()))
            }
            Channel::Released => return Err(StoreError::Released),
        };

        match shell.run(command) {
            Ok(output) => Ok(output),
            Err(e) => {
                // The stream can't be trusted to be in step any more
                error!("Error running shell command '{}': {}", command, e);
                if let Channel::Open(shell) = std::mem::replace(&mut self.channel, Channel::Lost) {
                    shell.close();
                }
                Err(StoreError::Io(e))
            }
        }
    }
}

impl ParameterStore for ShellStore {
    fn read(&mut self, key: &str) -> Result<String, StoreError> {
        let path = quote_path(self.layout.path(key)?)?;
        let output = self.run(&format!("cat {path}"))?;
        if output.status != "0" {
            return Err(StoreError::CommandFailed {
                status: output.status,
            });
        }
        Ok(output.last_line.unwrap_or_default())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if !is_plain_value(value) {
            return Err(StoreError::Rejected(value.to_string()));
        }
        let path = quote_path(self.layout.path(key)?)?;
        let output = self.run(&format!("echo {value} > {path}"))?;
        match output.status.as_str() {
            "0" => Ok(()),
            _ => Err(StoreError::CommandFailed {
                status: output.status,
            }),
        }
    }

    fn release(&mut self) {
        if let Channel::Open(shell) = std::mem::replace(&mut self.channel, Channel::Released) {
            shell.close();
            info!("Privileged shell released");
        }
    }
}

impl Drop for ShellStore {
    fn drop(&mut self) {
        self.release();
    }
}

fn check_access(shell: &mut Shell, require_root: bool) -> Result<(), String> {
    let answer = shell
        .run("true")
        .map_err(|e| format!("shell does not answer: {}", e))?;
    if answer.status != "0" {
        return Err(format!("shell check exited with {}", answer.status));
    }

    if require_root {
        let id = shell
            .run("id -u")
            .map_err(|e| format!("can't query uid: {}", e))?;
        if id.last_line.as_deref() != Some("0") {
            return Err("controller requires root access to work".into());
        }
    }
    Ok(())
}

fn is_plain_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_')
}

fn quote_path(path: &Path) -> Result<String, StoreError> {
    let text = path
        .to_str()
        .ok_or_else(|| StoreError::Rejected(path.display().to_string()))?;
    if text.is_empty() || text.contains(['\'', '\n', '\r']) {
        return Err(StoreError::Rejected(text.to_string()));
    }
    Ok(format!("'{text}'"))
}
