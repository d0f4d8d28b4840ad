//! DHT11 temperature and humidity sensor.
//!
//! The sensor talks over a single open-drain wire with a timing-based protocol: the host pulls
//! the line low to wake it up, the sensor answers with an 80 µs low and an 80 µs high, then sends
//! 40 bits. Every bit starts with a 50 µs low; the following high lasts ~27 µs for a `0` and
//! ~70 µs for a `1`.
//!
//! Reading is done by busy-polling, so a busy system occasionally misses a bit and the read
//! fails with a timeout or a checksum error. [Dht11::read_with_retries] covers for that. The
//! memory-mapped backends poll much faster than the character device one and fail less often.
use crate::{GpioError, GpioInput, GpioPin, GpioResult};
use log::{debug, trace, warn};
use std::thread::sleep;
use std::time::Duration;

const WAKEUP: Duration = Duration::from_millis(18);
const RELEASE: Duration = Duration::from_micros(40);
const TIMEOUT: Duration = Duration::from_micros(100);
/// High phases longer than this are a `1`.
const ONE_THRESHOLD: Duration = Duration::from_micros(60);

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DhtReading {
    /// Relative humidity, in percent.
    pub humidity: f64,
    /// Temperature, in degrees Celsius.
    pub temperature: f64,
}

/// Decodes the 5 bytes sent by the sensor.
///
/// # Errors
/// - `GpioError::Checksum` if the last byte doesn't match the sum of the others.
pub fn decode(bytes: [u8; 5]) -> GpioResult<DhtReading> {
    let sum = bytes[..4]
        .iter()
        .fold(0u8, |sum, &byte| sum.wrapping_add(byte));
    if sum != bytes[4] {
        debug!("DHT11 checksum mismatch in {:02X?}", bytes);
        return Err(GpioError::Checksum);
    }

    Ok(DhtReading {
        humidity: bytes[0] as f64,
        temperature: bytes[2] as f64 + bytes[3] as f64 * 0.1,
    })
}

pub struct Dht11<'a> {
    pin: &'a mut dyn GpioPin,
}

impl<'a> Dht11<'a> {
    pub const DEFAULT_ATTEMPTS: usize = 15;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(100);

    pub fn new(pin: &'a mut dyn GpioPin) -> Self {
        Dht11 { pin }
    }

    /// Performs a single read.
    ///
    /// # Errors
    /// - `GpioError::Timeout` if the sensor stopped answering mid-transfer.
    /// - `GpioError::Checksum` if a bit got misread.
    pub fn read(&mut self) -> GpioResult<DhtReading> {
        {
            let output = self.pin.as_output()?;
            output.write(false)?;
            sleep(WAKEUP);
            output.write(true)?;
            sleep(RELEASE);
        }

        let result = {
            let input = self.pin.as_input()?;
            receive(&*input)
        };

        // Leave the line idle (high) between reads.
        self.pin.as_output()?.write(true)?;

        let bytes = result?;
        trace!("DHT11 sent {:02X?}", bytes);
        decode(bytes)
    }

    /// Reads with the default of 15 attempts, 100 ms apart.
    pub fn read_with_default_retries(&mut self) -> GpioResult<DhtReading> {
        self.read_with_retries(Self::DEFAULT_ATTEMPTS, Self::DEFAULT_RETRY_DELAY)
    }

    /// Retries failed reads up to `attempts` times in total, waiting `delay` between them.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if `attempts` is zero.
    /// - The error of the last attempt if all of them failed.
    pub fn read_with_retries(
        &mut self,
        attempts: usize,
        delay: Duration,
    ) -> GpioResult<DhtReading> {
        let mut last_error = GpioError::InvalidArgument;

        for attempt in 1..=attempts {
            match self.read() {
                Ok(reading) => return Ok(reading),
                Err(e) => {
                    warn!("DHT11 read {}/{} failed: {}", attempt, attempts, e);
                    last_error = e;
                }
            }
            if attempt < attempts {
                sleep(delay);
            }
        }

        Err(last_error)
    }
}

/// Receives the sensor's response and the 40 data bits that follow, MSb first.
fn receive(input: &dyn GpioInput) -> GpioResult<[u8; 5]> {
    // Our own release, then the sensor's response.
    input.wait_while(true, TIMEOUT)?;
    input.wait_while(false, TIMEOUT)?;
    input.wait_while(true, TIMEOUT)?;

    let mut bytes = [0u8; 5];
    for bit in 0..40 {
        input.wait_while(false, TIMEOUT)?;
        let high = input.wait_while(true, TIMEOUT)?;
        if high > ONE_THRESHOLD {
            bytes[bit / 8] |= 0x80 >> (bit % 8);
        }
    }

    Ok(bytes)
}
