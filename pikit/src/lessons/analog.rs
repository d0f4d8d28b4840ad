use super::Context;
use super::leds::{SOFT_PWM_FREQUENCY, dim};
use log::info;
use pikit_gpio::adc::{self, AdcDevice, map_range, thermistor_celsius, to_voltage};
use pikit_gpio::motor::DcMotor;
use pikit_gpio::pwm::{PwmExtension, PwmPin, SoftPwmPin};
use pikit_gpio::rgb::{Color, RgbLed};
use pikit_gpio::GpioDriver;
use std::thread::sleep;
use std::time::Duration;

const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
const DIM_INTERVAL: Duration = Duration::from_millis(30);

fn open_adc<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<Box<dyn AdcDevice>> {
    let bus = ctx.i2c()?;
    let adc = adc::detect(&bus)?;
    info!("Using {:?}", adc);
    Ok(adc)
}

fn percent(value: u8) -> u8 {
    (value as u16 * 100 / 255) as u8
}

pub fn adc<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut adc = open_adc(ctx)?;

    while ctx.limit.running() {
        let value = adc.analog_read(0)?;
        let voltage = to_voltage(value, ctx.config.analog.vref);
        println!("ADC Value : {}, Voltage : {:.2}", value, voltage);
        sleep(SAMPLE_INTERVAL);
    }

    Ok(())
}

/// Dims an LED by the reading of ADC channel 0.
fn dim_by_channel_0<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut adc = open_adc(ctx)?;

    ctx.with_pwm(ctx.config.analog.led, |pwm| {
        pwm.set_frequency(SOFT_PWM_FREQUENCY)?;
        pwm.set_duty_cycle(0.0)?;
        pwm.enable()?;

        let mut last = None;
        while ctx.limit.running() {
            let value = adc.analog_read(0)?;
            if last != Some(value) {
                let voltage = to_voltage(value, ctx.config.analog.vref);
                println!("ADC Value : {}, Voltage : {:.2}", value, voltage);
                last = Some(value);
            }
            dim(pwm, value as f64 / 255.0, DIM_INTERVAL)?;
        }

        pwm.disable()?;
        Ok(())
    })
}

pub fn softlight<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    dim_by_channel_0(ctx)
}

/// Same circuit as [softlight], with a photoresistor in place of the potentiometer.
pub fn nightlamp<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    dim_by_channel_0(ctx)
}

pub fn colorful_softlight<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let analog = &ctx.config.analog;
    let mut adc = open_adc(ctx)?;

    let [mut red_pin, mut green_pin, mut blue_pin] = [
        ctx.gpio.get_pin(analog.rgb[0])?,
        ctx.gpio.get_pin(analog.rgb[1])?,
        ctx.gpio.get_pin(analog.rgb[2])?,
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
        analog.rgb_common_anode,
    )?;

    while ctx.limit.running() {
        let (r, g, b) = (
            adc.analog_read(0)?,
            adc.analog_read(1)?,
            adc.analog_read(2)?,
        );
        let color = Color::new(percent(r), percent(g), percent(b));
        if color != led.color() {
            println!("ADC Value value_Red: {}, value_Green: {}, value_Blue: {}", r, g, b);
            led.set_color(color)?;
        }
        led.hold(DIM_INTERVAL)?;
    }

    led.off()?;
    Ok(())
}

pub fn thermometer<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut adc = open_adc(ctx)?;

    while ctx.limit.running() {
        let value = adc.analog_read(0)?;
        let voltage = to_voltage(value, ctx.config.analog.vref);
        let celsius = thermistor_celsius(value);
        println!(
            "ADC Value : {}, Voltage : {:.2}, Temperature : {:.2}",
            value, voltage, celsius
        );
        sleep(SAMPLE_INTERVAL);
    }

    Ok(())
}

pub fn joystick<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut adc = open_adc(ctx)?;
    let mut button_pin = ctx.button(ctx.config.analog.joystick_button)?;
    let button = button_pin.as_input()?;

    while ctx.limit.running() {
        let x = adc.analog_read(1)?;
        let y = adc.analog_read(0)?;
        // Raw level of the stick's switch: 0 while pushed down.
        let z = u8::from(!button.read()?);
        println!("value_X: {}, value_Y: {}, value_Z: {}", x, y, z);
        sleep(Duration::from_millis(10));
    }

    Ok(())
}

/// Potentiometer centre stops the motor; either end runs it at full speed in one direction.
fn motor_speed(value: u8) -> f64 {
    map_range(value as f64, 128.0, 255.0, 0.0, 1.0).clamp(-1.0, 1.0)
}

pub fn motor<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let motion = &ctx.config.motion;
    let mut adc = open_adc(ctx)?;
    let mut forward_pin = ctx.gpio.get_pin(motion.motor_forward)?;
    let forward = forward_pin.as_output()?;
    let mut backward_pin = ctx.gpio.get_pin(motion.motor_backward)?;
    let backward = backward_pin.as_output()?;

    ctx.with_pwm(motion.motor_enable, |enable: &mut dyn PwmPin| {
        let mut motor = DcMotor::new(&*forward, &*backward, enable)?;

        let mut last = None;
        while ctx.limit.running() {
            let value = adc.analog_read(0)?;
            let speed = motor_speed(value);
            if last != Some(value) {
                println!("ADC Value : {}, speed : {:.0}%", value, speed * 100.0);
                last = Some(value);
            }
            motor.drive(speed)?;
            motor.hold(DIM_INTERVAL)?;
        }

        motor.stop()?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_spans_the_whole_reading() {
        assert_eq!(percent(0), 0);
        assert_eq!(percent(128), 50);
        assert_eq!(percent(255), 100);
    }

    #[test]
    fn motor_stops_at_the_centre() {
        assert_eq!(motor_speed(128), 0.0);
        assert_eq!(motor_speed(255), 1.0);
        assert_eq!(motor_speed(0), -1.0);
        assert!(motor_speed(64) < -0.4);
    }
}
