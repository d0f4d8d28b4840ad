//! Test doubles for the GPIO, I2C and PWM traits.

use crate::i2c::{I2cBus, I2cDevice};
use crate::pwm::{PwmPin, PwmPolarity};
use crate::{
    GpioBus, GpioBusInput, GpioBusOutput, GpioError, GpioInput, GpioOutput, GpioPin, GpioResult,
};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;
use std::time::Duration;

/// Shared, ordered log of writes across several mock outputs.
pub type Trace = Rc<RefCell<Vec<(&'static str, bool)>>>;

pub fn trace() -> Trace {
    Rc::new(RefCell::new(Vec::new()))
}

pub struct MockOutput {
    name: &'static str,
    trace: Trace,
}

impl MockOutput {
    pub fn new(name: &'static str, trace: &Trace) -> Self {
        MockOutput { name, trace: trace.clone() }
    }

    /// The values written to this output, in order.
    pub fn history(&self) -> Vec<bool> {
        self.trace
            .borrow()
            .iter()
            .filter(|(name, _)| *name == self.name)
            .map(|&(_, value)| value)
            .collect()
    }

    pub fn last(&self) -> Option<bool> {
        self.history().last().copied()
    }
}

impl Debug for MockOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockOutput({})", self.name)
    }
}

impl GpioOutput for MockOutput {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.trace.borrow_mut().push((self.name, value));
        Ok(())
    }
}

/// Input returning scripted values, then repeating the last one forever.
#[derive(Debug, Default)]
pub struct MockInput {
    script: RefCell<VecDeque<bool>>,
    current: Cell<bool>,
}

impl MockInput {
    pub fn constant(value: bool) -> Self {
        let input = MockInput::default();
        input.current.set(value);
        input
    }

    pub fn scripted(values: &[bool]) -> Self {
        MockInput {
            script: RefCell::new(values.iter().copied().collect()),
            current: Cell::new(false),
        }
    }

    pub fn set(&self, value: bool) {
        self.script.borrow_mut().clear();
        self.current.set(value);
    }
}

impl GpioInput for MockInput {
    fn read(&self) -> GpioResult<bool> {
        if let Some(value) = self.script.borrow_mut().pop_front() {
            self.current.set(value);
        }
        Ok(self.current.get())
    }
}

/// A pin whose output side records into a trace and whose input side is a [MockInput].
#[derive(Debug)]
pub struct MockPin {
    name: &'static str,
    trace: Trace,
    pub input: MockInput,
}

impl MockPin {
    pub fn new(name: &'static str, trace: &Trace, input: MockInput) -> Self {
        MockPin { name, trace: trace.clone(), input }
    }
}

impl GpioPin for MockPin {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>> {
        Ok(Box::new(MockInputView(&self.input)))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>> {
        Ok(Box::new(MockOutput::new(self.name, &self.trace)))
    }
}

#[derive(Debug)]
struct MockInputView<'a>(&'a MockInput);

impl GpioInput for MockInputView<'_> {
    fn read(&self) -> GpioResult<bool> {
        self.0.read()
    }
}

/// A bus that remembers everything written to it and reads back the last value.
pub struct MockBus<const N: usize> {
    writes: RefCell<Vec<[bool; N]>>,
}

impl<const N: usize> Default for MockBus<N> {
    fn default() -> Self {
        MockBus { writes: RefCell::new(Vec::new()) }
    }
}

impl<const N: usize> MockBus<N> {
    pub fn last(&self) -> [bool; N] {
        self.writes.borrow().last().copied().unwrap_or([false; N])
    }

    pub fn history(&self) -> Vec<[bool; N]> {
        self.writes.borrow().clone()
    }
}

impl<const N: usize> Debug for MockBus<N> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockBus<{}>", N)
    }
}

impl<const N: usize> GpioBusOutput<N> for MockBus<N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.writes.borrow_mut().push(*values);
        Ok(())
    }
}

impl<const N: usize> GpioBusInput<N> for MockBus<N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        Ok(self.last())
    }
}

/// Lets a [MockBus] stand in for a claimed bus of pins.
impl<const N: usize> GpioBus<N> for MockBus<N> {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>> {
        Ok(Box::new(MockBusView(&*self)))
    }

    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>> {
        Ok(Box::new(MockBusView(&*self)))
    }
}

#[derive(Debug)]
struct MockBusView<'a, const N: usize>(&'a MockBus<N>);

impl<const N: usize> GpioBusOutput<N> for MockBusView<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        self.0.write(values)
    }
}

impl<const N: usize> GpioBusInput<N> for MockBusView<'_, N> {
    fn read(&self) -> GpioResult<[bool; N]> {
        self.0.read()
    }
}

/// A 4x4 switch matrix. Writing the column bus selects columns, reading the row bus
/// reports the rows whose key in a selected column is held down.
///
/// Both buses use logical (active-high) values, like the drivers see them.
#[derive(Default)]
pub struct KeyMatrix {
    pressed: RefCell<HashSet<(u8, u8)>>,
    selected: Cell<[bool; 4]>,
}

impl KeyMatrix {
    pub fn press(&self, row: u8, col: u8) {
        self.pressed.borrow_mut().insert((row, col));
    }

    pub fn release_all(&self) {
        self.pressed.borrow_mut().clear();
    }
}

impl Debug for KeyMatrix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMatrix({:?})", self.pressed.borrow())
    }
}

impl GpioBusOutput<4> for KeyMatrix {
    fn write(&self, values: &[bool; 4]) -> GpioResult<()> {
        self.selected.set(*values);
        Ok(())
    }
}

impl GpioBusInput<4> for KeyMatrix {
    fn read(&self) -> GpioResult<[bool; 4]> {
        let selected = self.selected.get();
        let mut rows = [false; 4];
        for &(row, col) in self.pressed.borrow().iter() {
            if selected[col as usize] {
                rows[row as usize] = true;
            }
        }
        Ok(rows)
    }
}

/// One recorded I2C transaction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum I2cOp {
    WriteByte(u16, u8),
    ReadByte(u16),
    ReadByteData(u16, u8),
    WriteByteData(u16, u8, u8),
}

#[derive(Default)]
struct MockI2cState {
    present: HashSet<u16>,
    responses: HashMap<u16, VecDeque<u8>>,
    ops: Vec<I2cOp>,
}

/// An I2C bus with a configurable set of responding addresses.
#[derive(Clone, Default)]
pub struct MockI2cBus {
    state: Rc<RefCell<MockI2cState>>,
}

impl MockI2cBus {
    pub fn with_devices(addresses: &[u16]) -> Self {
        let bus = MockI2cBus::default();
        bus.state.borrow_mut().present.extend(addresses);
        bus
    }

    /// Queues bytes returned by reads from `address`.
    pub fn respond(&self, address: u16, bytes: &[u8]) {
        self.state
            .borrow_mut()
            .responses
            .entry(address)
            .or_default()
            .extend(bytes);
    }

    pub fn ops(&self) -> Vec<I2cOp> {
        self.state.borrow().ops.clone()
    }

    pub fn clear_ops(&self) {
        self.state.borrow_mut().ops.clear();
    }
}

impl Debug for MockI2cBus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockI2cBus({:?})", self.state.borrow().present)
    }
}

impl I2cBus for MockI2cBus {
    fn open(&self, address: u16) -> GpioResult<Box<dyn I2cDevice>> {
        Ok(Box::new(MockI2cDevice { address, state: self.state.clone() }))
    }
}

struct MockI2cDevice {
    address: u16,
    state: Rc<RefCell<MockI2cState>>,
}

impl MockI2cDevice {
    fn record(&self, op: I2cOp) -> GpioResult<()> {
        let mut state = self.state.borrow_mut();
        if !state.present.contains(&self.address) {
            return Err(GpioError::I2c("no acknowledge".to_string()));
        }
        state.ops.push(op);
        Ok(())
    }

    fn next_response(&self) -> u8 {
        self.state
            .borrow_mut()
            .responses
            .get_mut(&self.address)
            .and_then(VecDeque::pop_front)
            .unwrap_or(0)
    }
}

impl Debug for MockI2cDevice {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockI2cDevice({:#04x})", self.address)
    }
}

impl I2cDevice for MockI2cDevice {
    fn address(&self) -> u16 {
        self.address
    }

    fn write_byte(&mut self, value: u8) -> GpioResult<()> {
        self.record(I2cOp::WriteByte(self.address, value))
    }

    fn read_byte(&mut self) -> GpioResult<u8> {
        self.record(I2cOp::ReadByte(self.address))?;
        Ok(self.next_response())
    }

    fn read_byte_data(&mut self, register: u8) -> GpioResult<u8> {
        self.record(I2cOp::ReadByteData(self.address, register))?;
        Ok(self.next_response())
    }

    fn write_byte_data(&mut self, register: u8, value: u8) -> GpioResult<()> {
        self.record(I2cOp::WriteByteData(self.address, register, value))
    }
}

/// A PWM pin that only remembers its settings and the total time it was asked to hold.
#[derive(Debug, Default)]
pub struct MockPwmPin {
    pub period_ns: u32,
    pub duty_ns: u32,
    pub enabled: bool,
    pub polarity: PwmPolarity,
    pub held: Duration,
}

impl PwmPin for MockPwmPin {
    fn period_ns(&self) -> GpioResult<u32> {
        Ok(self.period_ns)
    }

    fn set_period_ns(&mut self, period_ns: u32) -> GpioResult<()> {
        self.period_ns = period_ns;
        Ok(())
    }

    fn duty_ns(&self) -> GpioResult<u32> {
        Ok(self.duty_ns)
    }

    fn set_duty_ns(&mut self, duty_ns: u32) -> GpioResult<()> {
        if duty_ns > self.period_ns {
            return Err(GpioError::InvalidArgument);
        }
        self.duty_ns = duty_ns;
        Ok(())
    }

    fn polarity(&self) -> GpioResult<PwmPolarity> {
        Ok(self.polarity)
    }

    fn set_polarity(&mut self, polarity: PwmPolarity) -> GpioResult<()> {
        self.polarity = polarity;
        Ok(())
    }

    fn is_enabled(&self) -> GpioResult<bool> {
        Ok(self.enabled)
    }

    fn enable(&mut self) -> GpioResult<()> {
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> GpioResult<()> {
        self.enabled = false;
        Ok(())
    }

    fn hold(&mut self, duration: Duration) -> GpioResult<()> {
        std::thread::sleep(duration);
        self.held += duration;
        Ok(())
    }
}

/// Replays a trace of a serial data line and its clock, returning the data level at every
/// rising clock edge.
pub fn clocked_bits(trace: &Trace, data: &str, clock: &str) -> Vec<bool> {
    let mut level = false;
    let mut clock_level = false;
    let mut bits = Vec::new();
    for &(name, value) in trace.borrow().iter() {
        if name == data {
            level = value;
        } else if name == clock {
            if value && !clock_level {
                bits.push(level);
            }
            clock_level = value;
        }
    }
    bits
}

/// Groups bits into bytes, first bit as the MSb.
pub fn msb_first_bytes(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| chunk.iter().fold(0, |acc, &bit| acc << 1 | bit as u8))
        .collect()
}
