//! Wiring of every lesson (JSON file) and runtime settings (environment).
use log::info;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value {value:?} for {name}")]
    InvalidValue { name: &'static str, value: String },
}

/// Pin numbers are BCM numbers. Defaults follow the kit's tutorial wiring.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub leds: LedConfig,
    pub sound: SoundConfig,
    pub analog: AnalogConfig,
    pub motion: MotionConfig,
    pub shift: ShiftConfig,
    pub sensors: SensorConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct LedConfig {
    pub led: usize,
    pub button: usize,
    /// The LED bar, lit by pulling its cathodes low.
    pub bar: [usize; 10],
    pub bar_active_low: bool,
    pub breathing: usize,
    /// Red, green and blue.
    pub rgb: [usize; 3],
    pub rgb_common_anode: bool,
}

impl Default for LedConfig {
    fn default() -> Self {
        LedConfig {
            led: 17,
            button: 18,
            bar: [17, 18, 27, 22, 23, 24, 25, 2, 3, 8],
            bar_active_low: true,
            breathing: 18,
            rgb: [17, 18, 27],
            rgb_common_anode: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SoundConfig {
    pub buzzer: usize,
    pub button: usize,
}

impl Default for SoundConfig {
    fn default() -> Self {
        SoundConfig {
            buzzer: 17,
            button: 18,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AnalogConfig {
    /// The LED dimmed by the softlight and nightlamp lessons.
    pub led: usize,
    pub rgb: [usize; 3],
    pub rgb_common_anode: bool,
    pub joystick_button: usize,
    /// Reference voltage of the ADC.
    pub vref: f64,
}

impl Default for AnalogConfig {
    fn default() -> Self {
        AnalogConfig {
            led: 17,
            rgb: [22, 27, 17],
            rgb_common_anode: true,
            joystick_button: 18,
            vref: 3.3,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct MotionConfig {
    pub motor_forward: usize,
    pub motor_backward: usize,
    pub motor_enable: usize,
    pub relay: usize,
    pub relay_button: usize,
    pub servo: usize,
    /// Correction applied to both ends of the servo's pulse range, in µs.
    pub servo_correction_us: u64,
    /// Coils A, B, C and D.
    pub stepper: [usize; 4],
}

impl Default for MotionConfig {
    fn default() -> Self {
        MotionConfig {
            motor_forward: 27,
            motor_backward: 17,
            motor_enable: 22,
            relay: 17,
            relay_button: 18,
            servo: 18,
            servo_correction_us: 0,
            stepper: [18, 23, 24, 25],
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ShiftPins {
    pub data: usize,
    pub latch: usize,
    pub clock: usize,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ShiftConfig {
    /// The register used by the chaser, seven segment and LED matrix lessons.
    pub register: ShiftPins,
    pub stopwatch_register: ShiftPins,
    /// Digit selects, most significant digit first.
    pub stopwatch_digits: [usize; 4],
    pub stopwatch_digits_active_low: bool,
}

impl Default for ShiftConfig {
    fn default() -> Self {
        ShiftConfig {
            register: ShiftPins {
                data: 17,
                latch: 27,
                clock: 22,
            },
            stopwatch_register: ShiftPins {
                data: 24,
                latch: 23,
                clock: 18,
            },
            stopwatch_digits: [17, 27, 22, 10],
            stopwatch_digits_active_low: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SensorConfig {
    pub dht: usize,
    pub keypad_rows: [usize; 4],
    pub keypad_cols: [usize; 4],
    pub ultrasonic_trigger: usize,
    pub ultrasonic_echo: usize,
    pub lcd_columns: u8,
    pub lcd_rows: u8,
}

impl Default for SensorConfig {
    fn default() -> Self {
        SensorConfig {
            dht: 17,
            keypad_rows: [18, 23, 24, 25],
            keypad_cols: [10, 22, 27, 17],
            ultrasonic_trigger: 23,
            ultrasonic_echo: 24,
            lcd_columns: 16,
            lcd_rows: 2,
        }
    }
}

impl Config {
    /// Loads the config at `path`.
    ///
    /// Returns `Ok(None)` if there is no such file.
    pub fn try_load(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Ok(Some(serde_json::from_reader(reader)?))
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Loads the config at `path`, writing the defaults there first if it doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if let Some(config) = Self::try_load(path)? {
            info!("Config loaded from {}.", path.display());
            return Ok(config);
        }

        info!("Config not found. Using default");
        let config = Config::default();
        config.save(path)?;
        info!("Default config saved to {}.", path.display());
        Ok(config)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum Backend {
    /// GPIO character device.
    #[default]
    Gpiod,
    /// `/dev/gpiomem` register mapping.
    GpioMem,
    /// `/dev/mem` register mapping, needs root.
    Mem,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gpiod" => Ok(Backend::Gpiod),
            "gpiomem" => Ok(Backend::GpioMem),
            "mem" => Ok(Backend::Mem),
            _ => Err(ConfigError::InvalidValue {
                name: "PIKIT_GPIO_BACKEND",
                value: s.to_string(),
            }),
        }
    }
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Backend::Gpiod => "gpiod",
            Backend::GpioMem => "gpiomem",
            Backend::Mem => "mem",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Settings {
    pub config_path: PathBuf,
    pub backend: Backend,
    pub gpio_chip: PathBuf,
    pub i2c_bus: PathBuf,
    /// Hardware PWM chip; software PWM is used when unset.
    pub pwm_chip: Option<usize>,
    pub run_limit: Option<Duration>,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| dotenv::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        fn parse<T: FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue { name, value })
        }

        let backend = match var("PIKIT_GPIO_BACKEND") {
            Some(value) => value.trim().parse()?,
            None => Backend::default(),
        };
        let pwm_chip = var("PIKIT_PWM_CHIP")
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse("PIKIT_PWM_CHIP", value))
            .transpose()?;
        let run_limit = var("PIKIT_RUN_SECONDS")
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse::<f64>("PIKIT_RUN_SECONDS", value))
            .transpose()?
            .map(|seconds| {
                Duration::try_from_secs_f64(seconds).map_err(|_| ConfigError::InvalidValue {
                    name: "PIKIT_RUN_SECONDS",
                    value: seconds.to_string(),
                })
            })
            .transpose()?;

        Ok(Settings {
            config_path: var("PIKIT_CONFIG")
                .unwrap_or_else(|| "pikit.json".to_string())
                .into(),
            backend,
            gpio_chip: var("PIKIT_GPIO_CHIP")
                .unwrap_or_else(|| pikit_gpio::gpiod::GpiodDriver::DEFAULT_CHIP.to_string())
                .into(),
            i2c_bus: var("PIKIT_I2C_BUS")
                .unwrap_or_else(|| pikit_gpio::i2c::LinuxI2cBus::DEFAULT_BUS.to_string())
                .into(),
            pwm_chip,
            run_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn settings_default_to_gpiod_and_software_pwm() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.backend, Backend::Gpiod);
        assert_eq!(settings.config_path, PathBuf::from("pikit.json"));
        assert_eq!(settings.gpio_chip, PathBuf::from("/dev/gpiochip0"));
        assert_eq!(settings.i2c_bus, PathBuf::from("/dev/i2c-1"));
        assert_eq!(settings.pwm_chip, None);
        assert_eq!(settings.run_limit, None);
    }

    #[test]
    fn settings_are_read_from_variables() {
        let settings = settings(&[
            ("PIKIT_GPIO_BACKEND", "gpiomem"),
            ("PIKIT_PWM_CHIP", "0"),
            ("PIKIT_RUN_SECONDS", "2.5"),
            ("PIKIT_I2C_BUS", "/dev/i2c-0"),
        ])
        .unwrap();
        assert_eq!(settings.backend, Backend::GpioMem);
        assert_eq!(settings.pwm_chip, Some(0));
        assert_eq!(settings.run_limit, Some(Duration::from_millis(2500)));
        assert_eq!(settings.i2c_bus, PathBuf::from("/dev/i2c-0"));
    }

    #[test]
    fn bad_settings_are_rejected() {
        assert!(matches!(
            settings(&[("PIKIT_GPIO_BACKEND", "sysfs")]),
            Err(ConfigError::InvalidValue { name: "PIKIT_GPIO_BACKEND", .. })
        ));
        assert!(matches!(
            settings(&[("PIKIT_RUN_SECONDS", "-1")]),
            Err(ConfigError::InvalidValue { name: "PIKIT_RUN_SECONDS", .. })
        ));
    }

    #[test]
    fn backend_names_parse_back() {
        for backend in [Backend::Gpiod, Backend::GpioMem, Backend::Mem] {
            assert_eq!(backend.to_string().parse::<Backend>().unwrap(), backend);
        }
    }

    #[test]
    fn missing_sections_keep_their_defaults() {
        let config: Config = serde_json::from_str(r#"{ "leds": { "led": 4 } }"#).unwrap();
        assert_eq!(config.leds.led, 4);
        assert_eq!(config.leds.button, 18);
        assert_eq!(config.sensors, SensorConfig::default());
    }

    #[test]
    fn load_or_default_writes_the_defaults() {
        let dir = std::env::temp_dir().join(format!("pikit-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("pikit.json");
        let _ = std::fs::remove_file(&path);

        assert!(Config::try_load(&path).unwrap().is_none());
        let config = Config::load_or_default(&path).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(Config::try_load(&path).unwrap(), Some(config));

        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            Config::load_or_default(&path),
            Err(ConfigError::Json(_))
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
