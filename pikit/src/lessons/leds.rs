use super::Context;
use log::{debug, info};
use pikit_gpio::debounce::{Edge, EdgeDetector, TimedDebounce};
use pikit_gpio::pwm::{PwmExtension, PwmPin, SoftPwmPin};
use pikit_gpio::rgb::{Color, RgbLed};
use pikit_gpio::{GpioActiveLevel, GpioDriver};
use std::thread::sleep;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);
/// Fast enough not to flicker, slow enough for bit-banged channels.
pub(super) const SOFT_PWM_FREQUENCY: f64 = 100.0;

pub fn blink<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut led_pin = ctx.gpio.get_pin(ctx.config.leds.led)?;
    let led = led_pin.as_output()?;

    while ctx.limit.running() {
        led.write(true)?;
        println!("led turned on >>>");
        sleep(Duration::from_secs(1));
        led.write(false)?;
        println!("led turned off <<<");
        sleep(Duration::from_secs(1));
    }

    Ok(())
}

pub fn button_led<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut led_pin = ctx.gpio.get_pin(ctx.config.leds.led)?;
    let led = led_pin.as_output()?;
    let mut button_pin = ctx.button(ctx.config.leds.button)?;
    let button = button_pin.as_input()?;
    let edges = EdgeDetector::new(&*button);

    while ctx.limit.running() {
        match edges.poll()? {
            Some(Edge::Pressed) => println!("led turned on >>>"),
            Some(Edge::Released) => println!("led turned off <<<"),
            None => {}
        }
        led.write(edges.is_active())?;
        sleep(POLL_INTERVAL);
    }

    led.write(false)?;
    Ok(())
}

pub fn table_lamp<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut led_pin = ctx.gpio.get_pin(ctx.config.leds.led)?;
    let led = led_pin.as_output()?;
    let mut button_pin = ctx.button(ctx.config.leds.button)?;
    let button = button_pin.as_input()?;
    let debounced = TimedDebounce::new(&*button);
    let edges = EdgeDetector::new(&debounced);

    let mut on = false;
    led.write(on)?;

    while ctx.limit.running() {
        if edges.poll()? == Some(Edge::Pressed) {
            on = !on;
            led.write(on)?;
            println!("led turned {}", if on { "on >>>" } else { "off <<<" });
        }
        sleep(POLL_INTERVAL);
    }

    led.write(false)?;
    Ok(())
}

pub fn light_water<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let leds = &ctx.config.leds;
    let mut bar = ctx.gpio.get_pin_bus(leds.bar)?;
    if leds.bar_active_low {
        bar.set_active_level(GpioActiveLevel::Low)?;
    }
    let bar = bar.as_output()?;

    let forward = 0..leds.bar.len();
    let backward = forward.clone().rev();
    while ctx.limit.running() {
        for lit in forward.clone().chain(backward.clone()) {
            let mut values = [false; 10];
            values[lit] = true;
            bar.write(&values)?;
            sleep(Duration::from_millis(100));
        }
    }

    bar.write(&[false; 10])?;
    Ok(())
}

pub fn breathing_led<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    ctx.with_pwm(ctx.config.leds.breathing, |pwm| {
        pwm.set_frequency(SOFT_PWM_FREQUENCY)?;
        pwm.set_duty_cycle(0.0)?;
        pwm.enable()?;

        while ctx.limit.running() {
            for percent in 0..=100 {
                dim(pwm, percent as f64 / 100.0, Duration::from_millis(10))?;
            }
            pwm.hold(Duration::from_secs(1))?;
            for percent in (0..=100).rev() {
                dim(pwm, percent as f64 / 100.0, Duration::from_millis(10))?;
            }
            pwm.hold(Duration::from_secs(1))?;
        }

        pwm.disable()?;
        Ok(())
    })
}

pub fn colorful_led<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let leds = &ctx.config.leds;
    let [mut red_pin, mut green_pin, mut blue_pin] = [
        ctx.gpio.get_pin(leds.rgb[0])?,
        ctx.gpio.get_pin(leds.rgb[1])?,
        ctx.gpio.get_pin(leds.rgb[2])?,
    ];
    let (red_out, green_out, blue_out) = (
        red_pin.as_output()?,
        green_pin.as_output()?,
        blue_pin.as_output()?,
    );
    let mut red = SoftPwmPin::new(&*red_out);
    let mut green = SoftPwmPin::new(&*green_out);
    let mut blue = SoftPwmPin::new(&*blue_out);
    let mut led = RgbLed::new(
        &mut red,
        &mut green,
        &mut blue,
        SOFT_PWM_FREQUENCY,
        leds.rgb_common_anode,
    )?;
    debug!("{:?} ready", led);

    let mut position = 0u8;
    while ctx.limit.running() {
        let color = Color::wheel(position);
        led.set_color(color)?;
        info!("r={}% g={}% b={}%", color.red, color.green, color.blue);
        led.hold(Duration::from_secs(1))?;
        position = position.wrapping_add(32);
    }

    led.off()?;
    Ok(())
}

/// Drives `pwm` at `ratio` duty for `duration`, keeping bit-banged channels running.
pub(super) fn dim(pwm: &mut dyn PwmPin, ratio: f64, duration: Duration) -> eyre::Result<()> {
    pwm.set_duty_cycle(ratio.clamp(0.0, 1.0))?;
    pwm.hold(duration)?;
    Ok(())
}
