//! Tests for the transceiver state machine
//!
//! Drives `Machine` with a scripted radio and LEDs, posting events the way
//! the interrupt handlers and the shell do.

use std::collections::VecDeque;

use embedded_hal::digital::{ErrorKind, ErrorType, OutputPin, StatefulOutputPin};

use trx_app::config::TEST_PAYLOAD;
use trx_app::gpio::Leds;
use trx_app::radio::{on_radio_events, Frame, Radio, RadioEvents, RadioIsr};
use trx_app::trx_fsm::{TrxEvent, TrxFsm};
use trx_app::{Action, Error, Events, Machine, MachineContext, RadioError, Shared, State};

// ============================================================================
// Mocks
// ============================================================================

#[derive(Debug, Default)]
struct MockLed {
    high: bool,
    toggles: u32,
    broken: bool,
}

impl MockLed {
    fn lit() -> Self {
        Self {
            high: true,
            ..Self::default()
        }
    }

    fn write(&mut self, high: bool) -> Result<(), ErrorKind> {
        if self.broken {
            return Err(ErrorKind::Other);
        }
        self.high = high;
        Ok(())
    }
}

impl ErrorType for MockLed {
    type Error = ErrorKind;
}

impl OutputPin for MockLed {
    fn set_low(&mut self) -> Result<(), ErrorKind> {
        self.write(false)
    }

    fn set_high(&mut self) -> Result<(), ErrorKind> {
        self.write(true)
    }
}

impl StatefulOutputPin for MockLed {
    fn is_set_high(&mut self) -> Result<bool, ErrorKind> {
        Ok(self.high)
    }

    fn is_set_low(&mut self) -> Result<bool, ErrorKind> {
        Ok(!self.high)
    }

    fn toggle(&mut self) -> Result<(), ErrorKind> {
        let high = !self.high;
        self.write(high)?;
        self.toggles += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct MockRadio {
    bring_ups: u32,
    bring_up_error: Option<RadioError>,
    transmit_error: Option<RadioError>,
    transmitted: Vec<Vec<u8>>,
    held: VecDeque<Frame>,
    continuous_calls: Vec<bool>,
}

impl MockRadio {
    fn with_frames(frames: &[&[u8]]) -> Self {
        let held = frames.iter().map(|f| Frame::from_slice(f).unwrap()).collect();
        Self {
            held,
            ..Self::default()
        }
    }
}

impl Radio for MockRadio {
    fn bring_up(&mut self) -> Result<(), RadioError> {
        self.bring_ups += 1;
        match self.bring_up_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn transmit_start(&mut self, payload: &[u8]) -> Result<(), RadioError> {
        self.transmitted.push(payload.to_vec());
        match self.transmit_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.held.pop_front()
    }

    fn set_continuous_receive(&mut self, enabled: bool) -> Result<(), RadioError> {
        self.continuous_calls.push(enabled);
        Ok(())
    }
}

// Callback side for posting radio completions
struct NoIsr;

impl RadioIsr for NoIsr {
    fn hold_packet(&mut self) {}

    fn calibrate(&mut self) -> Result<(), RadioError> {
        Ok(())
    }
}

fn started(shared: &Shared, radio: MockRadio) -> Machine<'_, MockRadio, MockLed> {
    let leds = Leds::new(MockLed::default(), Some(MockLed::default()));
    let mut machine = Machine::new(shared, radio, leds);
    machine.start().unwrap();
    machine
}

/// Polls until nothing is pending, checking the machine settles after each cycle.
fn drain(machine: &mut Machine<'_, MockRadio, MockLed>) -> Vec<Action> {
    let mut actions = Vec::new();
    while let Some(action) = machine.poll() {
        assert_eq!(machine.state(), State::Idle);
        actions.push(action);
        assert!(actions.len() < 100, "machine never drained");
    }
    actions
}

// ============================================================================
// Startup
// ============================================================================

#[test]
fn startup_brings_up_and_settles_in_idle() {
    let shared = Shared::new();
    let leds = Leds::new(MockLed::lit(), Some(MockLed::lit()));
    let mut machine = Machine::new(&shared, MockRadio::default(), leds);
    assert_eq!(machine.state(), State::Init);

    assert_eq!(machine.start(), Ok(()));

    assert_eq!(machine.state(), State::Idle);
    assert!(!machine.context().send_in_progress);
    assert_eq!(machine.radio().bring_ups, 1);
    assert!(!machine.leds().led0().high);
    assert!(!machine.leds().led1().unwrap().high);
    assert!(shared.events.peek(Events::ALL).is_empty());
}

#[test]
fn radio_bring_up_failure_is_fatal() {
    let shared = Shared::new();
    let radio = MockRadio {
        bring_up_error: Some(RadioError::Status(3)),
        ..MockRadio::default()
    };
    let leds = Leds::new(MockLed::default(), None);
    let mut machine = Machine::new(&shared, radio, leds);

    assert_eq!(machine.start(), Err(Error::Radio(RadioError::Status(3))));
    assert_eq!(machine.state(), State::Init);
}

#[test]
fn led_failure_is_fatal_and_skips_radio() {
    let shared = Shared::new();
    let broken = MockLed {
        broken: true,
        ..MockLed::default()
    };
    let leds = Leds::new(broken, None);
    let mut machine = Machine::new(&shared, MockRadio::default(), leds);

    assert_eq!(machine.start(), Err(Error::Gpio(ErrorKind::Other)));
    assert_eq!(machine.radio().bring_ups, 0);
}

#[test]
fn poll_with_nothing_pending_does_nothing() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    assert_eq!(machine.poll(), None);
    assert_eq!(machine.state(), State::Idle);
}

// ============================================================================
// Send
// ============================================================================

#[test]
fn send_request_transmits_test_payload() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_send();
    assert_eq!(machine.poll(), Some(Action::Transmit));

    assert_eq!(machine.state(), State::Idle);
    assert_eq!(machine.radio().transmitted, vec![TEST_PAYLOAD.to_vec()]);
    assert!(machine.context().send_in_progress);
    assert!(shared.events.peek(Events::ALL).is_empty());
}

#[test]
fn test_payload_steps_by_0x11() {
    for (i, byte) in TEST_PAYLOAD.iter().enumerate() {
        assert_eq!(usize::from(*byte), i * 0x11);
    }
}

#[test]
fn completed_send_toggles_send_led() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_send();
    machine.poll();
    on_radio_events(RadioEvents::TX_PACKET_SENT, &mut NoIsr, &shared);
    assert_eq!(machine.poll(), Some(Action::AnnounceSent));

    assert_eq!(machine.state(), State::Idle);
    assert!(!machine.context().send_in_progress);
    assert_eq!(machine.context().counters.packets_sent, 1);
    assert_eq!(machine.leds().led1().unwrap().toggles, 1);
    assert_eq!(machine.leds().led0().toggles, 0);
}

#[test]
fn send_led_falls_back_to_led0() {
    let shared = Shared::new();
    let leds = Leds::new(MockLed::default(), None);
    let mut machine = Machine::new(&shared, MockRadio::default(), leds);
    machine.start().unwrap();

    shared.request_send();
    machine.poll();
    shared.events.post(Events::RADIO_PACKET_SENT);
    machine.poll();

    assert_eq!(machine.leds().led0().toggles, 1);
}

#[test]
fn second_send_while_in_flight_is_dropped() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_send();
    assert_eq!(machine.poll(), Some(Action::Transmit));
    shared.request_send();
    assert_eq!(machine.poll(), Some(Action::DropSend));

    assert_eq!(machine.radio().transmitted.len(), 1);
    assert_eq!(machine.context().counters.sends_dropped, 1);
    assert!(machine.context().send_in_progress);

    shared.events.post(Events::RADIO_PACKET_SENT);
    machine.poll();
    shared.request_send();
    assert_eq!(machine.poll(), Some(Action::Transmit));
    assert_eq!(machine.radio().transmitted.len(), 2);
}

#[test]
fn failed_transmit_start_releases_send() {
    let shared = Shared::new();
    let radio = MockRadio {
        transmit_error: Some(RadioError::Status(2)),
        ..MockRadio::default()
    };
    let mut machine = started(&shared, radio);

    shared.request_send();
    machine.poll();
    assert!(!machine.context().send_in_progress);

    shared.request_send();
    assert_eq!(machine.poll(), Some(Action::Transmit));
    assert_eq!(machine.radio().transmitted.len(), 2);
}

#[test]
fn truncated_fifo_write_keeps_send_in_flight() {
    let shared = Shared::new();
    let radio = MockRadio {
        transmit_error: Some(RadioError::Truncated {
            written: 8,
            expected: 16,
        }),
        ..MockRadio::default()
    };
    let mut machine = started(&shared, radio);

    shared.request_send();
    machine.poll();

    assert!(machine.context().send_in_progress);
}

// ============================================================================
// Receive
// ============================================================================

#[test]
fn receive_drains_every_frame() {
    let shared = Shared::new();
    let radio = MockRadio::with_frames(&[&[1, 2, 3], &[4, 5], &TEST_PAYLOAD]);
    let mut machine = started(&shared, radio);

    shared.events.post(Events::RADIO_PACKET_RECEIVED);
    assert_eq!(machine.poll(), Some(Action::DrainReceived));

    assert_eq!(machine.state(), State::Idle);
    assert_eq!(machine.context().counters.frames_received, 3);
    assert!(machine.radio().held.is_empty());
    assert_eq!(machine.leds().led0().toggles, 1);
    assert!(shared.events.peek(Events::ALL).is_empty());
}

#[test]
fn receive_with_nothing_held_is_harmless() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.events.post(Events::RADIO_PACKET_RECEIVED);
    assert_eq!(machine.poll(), Some(Action::DrainReceived));

    assert_eq!(machine.context().counters.frames_received, 0);
    assert_eq!(machine.state(), State::Idle);
}

#[test]
fn receive_setting_is_applied_in_idle() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_receive_setting(true);
    assert_eq!(machine.poll(), Some(Action::ApplyReceiveSetting(true)));

    assert!(machine.context().continuous_receive_enabled);
    assert_eq!(machine.radio().continuous_calls, vec![true]);
    assert_eq!(machine.state(), State::Idle);
    assert!(shared.events.peek(Events::ALL).is_empty());
}

#[test]
fn repeating_receive_setting_changes_nothing_else() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_receive_setting(true);
    machine.poll();
    shared.request_receive_setting(true);
    machine.poll();

    assert_eq!(machine.radio().continuous_calls, vec![true, true]);
    assert!(machine.context().continuous_receive_enabled);
    assert!(machine.radio().transmitted.is_empty());
    assert_eq!(machine.leds().led0().toggles, 0);
}

#[test]
fn latest_receive_setting_wins() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_receive_setting(true);
    shared.request_receive_setting(false);
    assert_eq!(machine.poll(), Some(Action::ApplyReceiveSetting(false)));
    assert_eq!(machine.poll(), None);
}

// ============================================================================
// Errors
// ============================================================================

#[test]
fn radio_error_is_reported_and_cleared() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.raise_error(0xDEAD);
    assert_eq!(machine.poll(), Some(Action::ReportError(0xDEAD)));

    assert_eq!(machine.state(), State::Idle);
    assert_eq!(machine.context().last_error_code, 0);
    assert_eq!(machine.context().counters.radio_errors, 1);
    assert!(shared.events.peek(Events::ALL).is_empty());
}

#[test]
fn radio_callback_error_reaches_error_state() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    on_radio_events(RadioEvents::TX_ABORTED, &mut NoIsr, &shared);

    assert_eq!(
        machine.poll(),
        Some(Action::ReportError(RadioEvents::TX_ABORTED.bits()))
    );
}

// ============================================================================
// Ordering
// ============================================================================

#[test]
fn pending_events_are_served_by_priority() {
    let shared = Shared::new();
    let radio = MockRadio::with_frames(&[&[7]]);
    let mut machine = started(&shared, radio);

    shared.raise_error(0x100);
    shared.events.post(Events::RADIO_PACKET_RECEIVED);
    shared.request_receive_setting(true);
    shared.request_send();

    let actions = drain(&mut machine);

    assert_eq!(
        actions,
        vec![
            Action::Transmit,
            Action::DrainReceived,
            Action::ReportError(0x100),
            Action::ApplyReceiveSetting(true),
        ]
    );
}

#[test]
fn sent_outranks_received() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_send();
    machine.poll();
    on_radio_events(
        RadioEvents::RX_PACKET_RECEIVED | RadioEvents::TX_PACKET_SENT,
        &mut NoIsr,
        &shared,
    );

    assert_eq!(drain(&mut machine), vec![Action::AnnounceSent, Action::DrainReceived]);
}

#[test]
fn any_event_sequence_settles_in_idle() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::with_frames(&[&[1], &[2]]));

    let script = [
        Events::REQUEST_SEND,
        Events::REQUEST_SEND | Events::RADIO_PACKET_SENT,
        Events::RADIO_ERROR,
        Events::RADIO_PACKET_RECEIVED | Events::RECEIVE_SETTING_CHANGED,
        Events::ALL,
        Events::RADIO_PACKET_SENT,
    ];
    for events in script {
        shared.events.post(events);
        drain(&mut machine);
        assert_eq!(machine.state(), State::Idle);
        assert!(shared.events.peek(Events::ALL).is_empty());
    }
    assert!(!machine.context().send_in_progress);
}

#[test]
fn step_serves_pending_event() {
    let shared = Shared::new();
    let mut machine = started(&shared, MockRadio::default());

    shared.request_send();
    assert_eq!(machine.step(), Some(Action::Transmit));
}

// ============================================================================
// Counters
// ============================================================================

fn enter(ctx: &mut MachineContext, events: Events) {
    let mut fsm = TrxFsm::Idle;
    fsm.dispatch(ctx, &TrxEvent::Observed(events));
}

#[test]
fn counters_wrap_instead_of_overflowing() {
    let mut ctx = MachineContext::new();
    ctx.counters.radio_errors = u32::MAX;
    ctx.counters.packets_sent = u32::MAX;
    ctx.counters.sends_dropped = u32::MAX;

    enter(&mut ctx, Events::RADIO_ERROR);
    enter(&mut ctx, Events::RADIO_PACKET_SENT);
    ctx.send_in_progress = true;
    enter(&mut ctx, Events::REQUEST_SEND);

    assert_eq!(ctx.counters.radio_errors, 0);
    assert_eq!(ctx.counters.packets_sent, 0);
    assert_eq!(ctx.counters.sends_dropped, 0);
}
