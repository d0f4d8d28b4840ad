use super::Context;
use pikit_gpio::GpioDriver;
use pikit_gpio::buzzer::{Buzzer, TonalBuzzer};
use pikit_gpio::debounce::{Edge, EdgeDetector};
use std::thread::sleep;
use std::time::Duration;

pub fn doorbell<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let sound = &ctx.config.sound;
    let mut buzzer_pin = ctx.gpio.get_pin(sound.buzzer)?;
    let buzzer_out = buzzer_pin.as_output()?;
    let buzzer = Buzzer::new(&*buzzer_out);
    let mut button_pin = ctx.button(sound.button)?;
    let button = button_pin.as_input()?;
    let edges = EdgeDetector::new(&*button);

    while ctx.limit.running() {
        match edges.poll()? {
            Some(Edge::Pressed) => println!("buzzer turned on >>>"),
            Some(Edge::Released) => println!("buzzer turned off <<<"),
            None => {}
        }
        buzzer.set(edges.is_active())?;
        sleep(Duration::from_millis(10));
    }

    Ok(())
}

pub fn alertor<D: GpioDriver>(ctx: &Context<'_, D>) -> eyre::Result<()> {
    let sound = &ctx.config.sound;
    let mut button_pin = ctx.button(sound.button)?;
    let button = button_pin.as_input()?;

    ctx.with_pwm(sound.buzzer, |pwm| {
        let mut buzzer = TonalBuzzer::new(pwm);

        while ctx.limit.running() {
            if button.read()? {
                if buzzer.frequency().is_none() {
                    println!("alertor turned on >>>");
                }
                // One sweep per second, re-checking the button every degree.
                for degrees in 0..361 {
                    if !button.read()? {
                        break;
                    }
                    buzzer.play(TonalBuzzer::alert_sweep(degrees))?;
                    buzzer.hold(Duration::from_millis(3))?;
                }
            } else if buzzer.frequency().is_some() {
                println!("alertor turned off <<<");
                buzzer.stop()?;
            } else {
                sleep(Duration::from_millis(10));
            }
        }

        Ok(())
    })
}
