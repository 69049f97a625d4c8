use anyhow::{bail, Context, Result};
use control::{Temperature, DEFAULT_TEMPERATURE};
use serde::Deserialize;

/// Start or stop request, as sent by the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlCommand {
    pub enabled: bool,
    #[serde(alias = "maxCpuTemp", default = "default_temperature")]
    pub max_temperature: Temperature,
}

fn default_temperature() -> Temperature {
    DEFAULT_TEMPERATURE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Control(ControlCommand),
    Status,
    Quit,
}

impl Request {
    /// Parses one line of operator input. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Request>> {
        let line = line.trim();
        let request = match line {
            "" => return Ok(None),
            "status" => Request::Status,
            "quit" | "exit" => Request::Quit,
            _ if line.starts_with('{') => {
                let command = serde_json::from_str(line)
                    .with_context(|| format!("Malformed control command {:?}", line))?;
                Request::Control(command)
            }
            _ => bail!(
                "Unknown request {:?}, expected a control command, 'status' or 'quit'",
                line
            ),
        };
        Ok(Some(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_start_command() {
        let request = Request::parse(r#"{"enabled": true, "maxTemperature": 55}"#).unwrap();
        assert_eq!(
            request,
            Some(Request::Control(ControlCommand {
                enabled: true,
                max_temperature: Temperature::new(55),
            }))
        );
    }

    #[test]
    fn test_parse_legacy_field_name() {
        let request = Request::parse(r#"{"enabled": true, "maxCpuTemp": 48}"#).unwrap();
        let Some(Request::Control(command)) = request else {
            panic!("expected a control command, got {:?}", request);
        };
        assert_eq!(command.max_temperature, Temperature::new(48));
    }

    #[test]
    fn test_missing_threshold_uses_default() {
        let request = Request::parse(r#"{"enabled": false}"#).unwrap();
        let Some(Request::Control(command)) = request else {
            panic!("expected a control command, got {:?}", request);
        };
        assert!(!command.enabled);
        assert_eq!(command.max_temperature, DEFAULT_TEMPERATURE);
    }

    #[test]
    fn test_parse_keywords() {
        assert_eq!(Request::parse("status\n").unwrap(), Some(Request::Status));
        assert_eq!(Request::parse("quit").unwrap(), Some(Request::Quit));
        assert_eq!(Request::parse("exit").unwrap(), Some(Request::Quit));
        assert_eq!(Request::parse("   ").unwrap(), None);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Request::parse("start please").is_err());
        assert!(Request::parse(r#"{"enabled": "yes"}"#).is_err());
    }
}
