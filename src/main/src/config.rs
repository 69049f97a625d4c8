use core::time::Duration;
use std::path::PathBuf;

use anyhow::{Context, Result};
use control::{ControllerConfig, InjectionProbability, Temperature};

use crate::shell::{ShellConfig, SysfsLayout};

#[toml_cfg::toml_config]
pub struct TomlConfig {
    #[default(60)]
    tick_interval: u64,
    #[default(60)]
    max_temperature: i32,
    // 0 leaves the ramp-up unbounded
    #[default(0)]
    probability_ceiling: u32,
    #[default("su")]
    shell: &'static str,
    #[default(true)]
    require_root: bool,
    #[default("/sys/devices/cpu/power/cpuidle_injection_status")]
    injection_enabled_path: &'static str,
    #[default("/sys/devices/cpu/power/cpuidle_injection_prob")]
    injection_probability_path: &'static str,
    // OMAP sensor, only present on the Galaxy Nexus
    #[default("/sys/devices/platform/omap/omap_temp_sensor.0/temperature")]
    cpu_temperature_path: &'static str,
    #[default("/sys/class/power_supply/battery/temp")]
    battery_temperature_path: &'static str,
    #[default("/data/local/tmp/cputemp-throttle/session.json")]
    session_path: &'static str,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub controller: ControllerConfig,
    pub shell: ShellConfig,
    pub layout: SysfsLayout,
    pub battery_path: PathBuf,
    pub session_path: PathBuf,
}

impl Config {
    pub fn read() -> Result<Self> {
        Config::try_from(TOML_CONFIG)
    }
}

impl TryFrom<TomlConfig> for Config {
    type Error = anyhow::Error;

    fn try_from(config: TomlConfig) -> Result<Self> {
        let ceiling = match config.probability_ceiling {
            0 => None,
            value => Some(InjectionProbability::new(value)),
        };
        let controller = ControllerConfig::new(
            Temperature::new(config.max_temperature),
            Duration::from_secs(config.tick_interval),
            ceiling,
        )
        .context("Invalid controller settings in cfg.toml")?;

        Ok(Config {
            controller,
            shell: ShellConfig {
                program: config.shell.to_string(),
                require_root: config.require_root,
            },
            layout: SysfsLayout {
                injection_enabled: PathBuf::from(config.injection_enabled_path),
                injection_probability: PathBuf::from(config.injection_probability_path),
                cpu_temperature: PathBuf::from(config.cpu_temperature_path),
            },
            battery_path: PathBuf::from(config.battery_temperature_path),
            session_path: PathBuf::from(config.session_path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toml_config() -> TomlConfig {
        TomlConfig {
            tick_interval: 60,
            max_temperature: 60,
            probability_ceiling: 0,
            shell: "su",
            require_root: true,
            injection_enabled_path: "/sys/a",
            injection_probability_path: "/sys/b",
            cpu_temperature_path: "/sys/c",
            battery_temperature_path: "/sys/d",
            session_path: "/tmp/session.json",
        }
    }

    #[test]
    fn test_zero_ceiling_means_unbounded() {
        let config = Config::try_from(toml_config()).unwrap();
        assert_eq!(config.controller.probability_ceiling, None);
        assert_eq!(config.controller.tick_interval, Duration::from_secs(60));
    }

    #[test]
    fn test_ceiling_is_carried_over() {
        let config = Config::try_from(TomlConfig {
            probability_ceiling: 128,
            ..toml_config()
        })
        .unwrap();
        assert_eq!(
            config.controller.probability_ceiling,
            Some(InjectionProbability::new(128))
        );
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let result = Config::try_from(TomlConfig {
            max_temperature: 150,
            ..toml_config()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = Config::try_from(TomlConfig {
            tick_interval: 0,
            ..toml_config()
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_built_in_defaults_are_valid() {
        assert!(Config::read().is_ok());
    }
}
