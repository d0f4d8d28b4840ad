use std::path::Path;
use std::time::{Duration, Instant};
use time::OffsetDateTime;

const CPU_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Reads the SoC temperature, in degrees Celsius.
pub fn cpu_temperature() -> eyre::Result<f64> {
    read_millidegrees(Path::new(CPU_THERMAL_ZONE))
}

fn read_millidegrees(path: &Path) -> eyre::Result<f64> {
    let raw = std::fs::read_to_string(path)?;
    let millidegrees: i64 = raw.trim().parse()?;
    Ok(millidegrees as f64 / 1000.0)
}

/// The current wall-clock time as `HH:MM:SS`.
///
/// Falls back to UTC when the local offset can't be determined.
pub fn clock() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let (h, m, s) = now.to_hms();
    format!("{:02}:{:02}:{:02}", h, m, s)
}

/// Keeps a lesson loop going until an optional deadline.
#[derive(Copy, Clone, Debug)]
pub struct RunLimit {
    deadline: Option<Instant>,
}

impl RunLimit {
    pub fn new(limit: Option<Duration>) -> Self {
        RunLimit {
            deadline: limit.map(|limit| Instant::now() + limit),
        }
    }

    pub fn unlimited() -> Self {
        RunLimit { deadline: None }
    }

    pub fn running(&self) -> bool {
        self.deadline.is_none_or(|deadline| Instant::now() < deadline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_limit_expires() {
        assert!(RunLimit::unlimited().running());
        assert!(RunLimit::new(Some(Duration::from_secs(60))).running());
        assert!(!RunLimit::new(Some(Duration::ZERO)).running());
    }

    #[test]
    fn thermal_zone_is_in_millidegrees() {
        let path = std::env::temp_dir().join(format!("pikit-temp-{}", std::process::id()));
        std::fs::write(&path, "48312\n").unwrap();
        assert_eq!(read_millidegrees(&path).unwrap(), 48.312);
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn clock_is_zero_padded() {
        let clock = clock();
        assert_eq!(clock.len(), 8);
        assert_eq!(clock.as_bytes()[2], b':');
        assert_eq!(clock.as_bytes()[5], b':');
    }
}
