use super::Context;
use pikit_gpio::GpioDriver;
use pikit_gpio::debounce::{Edge, EdgeDetector, TimedDebounce};
use pikit_gpio::motor::Relay;
use pikit_gpio::servo::Servo;
use pikit_gpio::stepper::{Direction, Stepper};
use std::thread::sleep;
use std::time::Duration;

pub fn relay<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let motion = &ctx.config.motion;
    let mut relay_pin = ctx.gpio.get_pin(motion.relay)?;
    let relay_out = relay_pin.as_output()?;
    let mut relay = Relay::new(&*relay_out)?;
    let mut button_pin = ctx.button(motion.relay_button)?;
    let button = button_pin.as_input()?;
    let debounced = TimedDebounce::new(&*button);
    let edges = EdgeDetector::new(&debounced);

    while ctx.limit.running() {
        if edges.poll()? == Some(Edge::Pressed) {
            relay.toggle()?;
            println!("relay turned {}", if relay.is_closed() { "on" } else { "off" });
        }
        sleep(Duration::from_millis(10));
    }

    relay.set(false)?;
    Ok(())
}

pub fn sweep<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let motion = &ctx.config.motion;
    let correction = Duration::from_micros(motion.servo_correction_us);

    ctx.with_pwm(motion.servo, |pwm| {
        let mut servo = Servo::new(pwm)?.with_correction(correction);
        let step = Duration::from_millis(10);

        while ctx.limit.running() {
            for angle in 0..=180 {
                servo.set_angle(angle as f64)?;
                servo.hold(step)?;
            }
            servo.hold(Duration::from_millis(500))?;
            for angle in (0..=180).rev() {
                servo.set_angle(angle as f64)?;
                servo.hold(step)?;
            }
            servo.hold(Duration::from_millis(500))?;
        }

        servo.detach()?;
        Ok(())
    })
}

pub fn stepper<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let mut coils = ctx.gpio.get_pin_bus(ctx.config.motion.stepper)?;
    let coils = coils.as_output()?;
    let stepper = Stepper::new(&*coils);
    let pause = Duration::from_millis(500);

    while ctx.limit.running() {
        stepper.step_cycles(
            Direction::Clockwise,
            Stepper::MIN_STEP_DELAY,
            Stepper::CYCLES_PER_TURN,
        )?;
        sleep(pause);
        stepper.step_cycles(
            Direction::CounterClockwise,
            Stepper::MIN_STEP_DELAY,
            Stepper::CYCLES_PER_TURN,
        )?;
        sleep(pause);
    }

    stepper.stop()?;
    Ok(())
}
