use super::Context;
use crate::config::ShiftPins;
use pikit_gpio::shift::{
    BitOrder, LedMatrix, MultiplexedDisplay, SevenSegment, ShiftRegister, scroll, text_strip,
};
use pikit_gpio::{GpioActiveLevel, GpioDriver};
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Runs `f` with a 74HC595 wired to `pins`.
fn with_register<D: GpioDriver, R>(
    ctx: &Context<'_, D>,
    pins: ShiftPins,
    order: BitOrder,
    f: impl FnOnce(&ShiftRegister) -> eyre::Result<R>,
) -> eyre::Result<R> {
    let mut data_pin = ctx.gpio.get_pin(pins.data)?;
    let mut clock_pin = ctx.gpio.get_pin(pins.clock)?;
    let mut latch_pin = ctx.gpio.get_pin(pins.latch)?;
    let (data, clock, latch) = (
        data_pin.as_output()?,
        clock_pin.as_output()?,
        latch_pin.as_output()?,
    );
    let register = ShiftRegister::new(&*data, &*clock, &*latch).with_bit_order(order);
    f(&register)
}

pub fn light_water_595<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    with_register(ctx, ctx.config.shift.register, BitOrder::LsbFirst, |register| {
        let step = Duration::from_millis(100);

        while ctx.limit.running() {
            for bit in (0..8).chain((0..8).rev()) {
                register.write(&[1 << bit])?;
                sleep(step);
            }
        }

        register.write(&[0x00])?;
        Ok(())
    })
}

pub fn seven_segment<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    with_register(ctx, ctx.config.shift.register, BitOrder::MsbFirst, |register| {
        let step = Duration::from_millis(500);

        'outer: while ctx.limit.running() {
            for dot in [false, true] {
                for digit in 0..16 {
                    if !ctx.limit.running() {
                        break 'outer;
                    }
                    let code = SevenSegment::digit(digit)?;
                    let code = if dot { SevenSegment::with_dot(code) } else { code };
                    register.write(&[code])?;
                    sleep(step);
                }
            }
        }

        register.write(&[SevenSegment::BLANK])?;
        Ok(())
    })
}

pub fn stopwatch<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let shift = &ctx.config.shift;
    let mut digits = ctx.gpio.get_pin_bus(shift.stopwatch_digits)?;
    if shift.stopwatch_digits_active_low {
        digits.set_active_level(GpioActiveLevel::Low)?;
    }
    let digits = digits.as_output()?;

    with_register(ctx, shift.stopwatch_register, BitOrder::MsbFirst, |register| {
        let display = MultiplexedDisplay::new(register, &*digits);
        let start = Instant::now();
        let mut shown = None;

        while ctx.limit.running() {
            let seconds = (start.elapsed().as_secs() % 10_000) as u32;
            if shown != Some(seconds) {
                println!("counter : {}", seconds);
                shown = Some(seconds);
            }
            display.show(seconds)?;
        }

        display.clear()?;
        Ok(())
    })
}

pub fn led_matrix<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    with_register(ctx, ctx.config.shift.register, BitOrder::MsbFirst, |register| {
        let matrix = LedMatrix::new(register);
        // Pad with spaces so the text scrolls in from the right and out to the left.
        let strip = text_strip(" 0123456789ABCDEF ");

        while ctx.limit.running() {
            matrix.show_for(&LedMatrix::SMILEY, Duration::from_secs(4))?;
            for frame in scroll(&strip) {
                if !ctx.limit.running() {
                    break;
                }
                matrix.show_for(&frame, Duration::from_millis(150))?;
            }
        }

        matrix.clear()?;
        Ok(())
    })
}
