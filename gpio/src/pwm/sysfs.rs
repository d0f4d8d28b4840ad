use crate::pwm::{PwmDriver, PwmPin, PwmPolarity};
use crate::{GpioError, GpioResult};
use log::debug;
use std::fmt::{Debug, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::thread::sleep;
use std::time::Duration;

const SYSFS_PWM: &str = "/sys/class/pwm";

/// Hardware PWM channels exported through `/sys/class/pwm/pwmchipN`.
///
/// On the Pi, the channels only exist once the `pwm` or `pwm-2chan` overlay is loaded.
/// With `dtoverlay=pwm`, channel 0 comes out on GPIO18.
pub struct SysfsPwmDriver {
    base_path: PathBuf,
}

impl SysfsPwmDriver {
    pub fn count_chips() -> GpioResult<usize> {
        let path = Path::new(SYSFS_PWM);
        let count = (0..)
            .take_while(|index| path.join(format!("pwmchip{}", index)).exists())
            .count();
        Ok(count)
    }

    pub fn get_chip(index: usize) -> GpioResult<Self> {
        let chip_path = Path::new(SYSFS_PWM).join(format!("pwmchip{}", index));
        if !chip_path.exists() {
            return Err(GpioError::NotFound);
        }
        Ok(Self::with_path(chip_path))
    }

    /// A driver for the chip directory at `path`, without checking that it exists.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        SysfsPwmDriver {
            base_path: path.into(),
        }
    }
}

impl Debug for SysfsPwmDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmDriver({:?})", self.base_path)
    }
}

impl PwmDriver for SysfsPwmDriver {
    fn count(&self) -> GpioResult<usize> {
        read_value(&self.base_path.join("npwm"))
    }

    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn PwmPin + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        let path = self.base_path.join(format!("pwm{}", index));
        if path.exists() {
            // Left behind by a process that never got to unexport it.
            debug!("{:?} channel {} still exported, releasing it", self, index);
            std::fs::write(self.base_path.join("unexport"), index.to_string())?;
        }

        std::fs::write(self.base_path.join("export"), index.to_string())?;

        // udev needs a moment to fix up the attribute permissions after an export.
        for _ in 0..10 {
            if path.join("enable").exists() {
                break;
            }
            sleep(Duration::from_millis(10));
        }
        if !path.exists() {
            return Err(GpioError::NotFound);
        }

        debug!("{:?} exported channel {}", self, index);
        Ok(Box::new(SysfsPwmPin {
            driver: self,
            index,
            base_path: path,
        }))
    }
}

pub struct SysfsPwmPin<'a> {
    driver: &'a SysfsPwmDriver,
    index: usize,
    base_path: PathBuf,
}

impl Debug for SysfsPwmPin<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SysfsPwmPin({:?})", self.base_path)
    }
}

fn read_value<T: FromStr>(path: &Path) -> GpioResult<T> {
    let content = std::fs::read_to_string(path)?;
    content
        .trim()
        .parse()
        .map_err(|_| GpioError::Other(format!("parsing {:?} failed", path)))
}

impl PwmPin for SysfsPwmPin<'_> {
    fn period_ns(&self) -> GpioResult<u32> {
        read_value(&self.base_path.join("period"))
    }

    fn set_period_ns(&mut self, period_ns: u32) -> GpioResult<()> {
        std::fs::write(self.base_path.join("period"), period_ns.to_string())?;
        Ok(())
    }

    fn duty_ns(&self) -> GpioResult<u32> {
        read_value(&self.base_path.join("duty_cycle"))
    }

    fn set_duty_ns(&mut self, duty_ns: u32) -> GpioResult<()> {
        if duty_ns > self.period_ns()? {
            return Err(GpioError::InvalidArgument);
        }
        std::fs::write(self.base_path.join("duty_cycle"), duty_ns.to_string())?;
        Ok(())
    }

    fn polarity(&self) -> GpioResult<PwmPolarity> {
        let content = std::fs::read_to_string(self.base_path.join("polarity"))?;
        PwmPolarity::from_str(content.trim())
    }

    fn set_polarity(&mut self, polarity: PwmPolarity) -> GpioResult<()> {
        std::fs::write(self.base_path.join("polarity"), polarity.to_string())?;
        Ok(())
    }

    fn is_enabled(&self) -> GpioResult<bool> {
        let content = std::fs::read_to_string(self.base_path.join("enable"))?;
        match content.trim() {
            "1" => Ok(true),
            "0" => Ok(false),
            other => Err(GpioError::Other(format!("unexpected PWM enable state {:?}", other))),
        }
    }

    fn enable(&mut self) -> GpioResult<()> {
        std::fs::write(self.base_path.join("enable"), "1")?;
        Ok(())
    }

    fn disable(&mut self) -> GpioResult<()> {
        std::fs::write(self.base_path.join("enable"), "0")?;
        Ok(())
    }
}

impl Drop for SysfsPwmPin<'_> {
    fn drop(&mut self) {
        _ = self.disable();
        _ = std::fs::write(self.driver.base_path.join("unexport"), self.index.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn fake_chip(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pikit-pwm-{}-{}", name, std::process::id()));
        _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("pwm0")).unwrap();
        fs::write(dir.join("npwm"), "2\n").unwrap();
        fs::write(dir.join("pwm0").join("enable"), "1\n").unwrap();
        dir
    }

    #[test]
    fn stale_export_is_released_and_exported_again() {
        let dir = fake_chip("stale");
        let driver = SysfsPwmDriver::with_path(&dir);

        let pin = driver.get_pin(0).unwrap();
        assert_eq!(fs::read_to_string(dir.join("unexport")).unwrap(), "0");
        assert_eq!(fs::read_to_string(dir.join("export")).unwrap(), "0");
        assert!(pin.is_enabled().unwrap());

        drop(pin);
        assert_eq!(fs::read_to_string(dir.join("pwm0").join("enable")).unwrap(), "0");
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn channel_past_npwm_is_rejected() {
        let dir = fake_chip("range");
        let driver = SysfsPwmDriver::with_path(&dir);

        assert!(matches!(driver.get_pin(2), Err(GpioError::InvalidArgument)));
        fs::remove_dir_all(&dir).unwrap();
    }
}
