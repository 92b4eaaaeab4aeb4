use std::collections::VecDeque;

use embassy_futures::block_on;
use embassy_futures::join::join;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Sender};
use embedded_hal::digital::{ErrorKind as PinErrorKind, ErrorType as PinErrorType};
use embedded_hal::i2c::ErrorKind;
use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::digital::Wait;
use embedded_hal_async::i2c::I2c;

use pinephone_keyboard_async::crc::crc8;
use pinephone_keyboard_async::keymap::{KeymapError, DEFAULT_FN_KEYMAP, DEFAULT_KEYMAP};
use pinephone_keyboard_async::reg;
use pinephone_keyboard_async::{
    key, Config, Direction, Error, InputEvent, KeyCode, KeyEntry, KeyEvent, Keyboard,
    KeymapConfig, ScanError, Transport, TunnelError,
};

type Events = Channel<CriticalSectionRawMutex, InputEvent, 64>;
type EventSender<'a> = Sender<'a, CriticalSectionRawMutex, InputEvent, 64>;
type TestKeyboard<'a> =
    Keyboard<CriticalSectionRawMutex, FakeController, YieldingDelay, EventSender<'a>>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Access {
    ReadBlock(u8, usize),
    WriteBlock(u8, Vec<u8>),
    ReadByte(u8),
    WriteByte(u8, u8),
}

/// Register-level model of the keyboard controller.
struct FakeController {
    id: [u8; reg::INFO_LEN],
    sys_config: u8,
    /// Frames handed out by scan reads; the last one repeats.
    frames: VecDeque<Vec<u8>>,
    last_frame: Vec<u8>,
    statuses: VecDeque<u8>,
    smbus_data: u8,
    log: Vec<Access>,
}

impl FakeController {
    fn new(rows: u8, cols: u8) -> Self {
        let mut last_frame = vec![0u8; cols as usize + 1];
        last_frame[0] = crc8(&last_frame[1..]);
        Self {
            id: [0x4B, 0x42, 0x12, 0x01, 0x00, 0x00, cols << 4 | rows],
            sys_config: 0x00,
            frames: VecDeque::new(),
            last_frame,
            statuses: VecDeque::new(),
            smbus_data: 0,
            log: Vec::new(),
        }
    }

    fn scan_enabled(&self) -> bool {
        self.sys_config & reg::SYS_CONFIG_DISABLE_SCAN == 0
    }

    fn scan_reads(&self) -> usize {
        self.log
            .iter()
            .filter(|access| matches!(access, Access::ReadBlock(reg::SCAN_CRC, _)))
            .count()
    }
}

impl Transport for FakeController {
    type Error = ErrorKind;

    async fn read_block(&mut self, start: u8, buf: &mut [u8]) -> Result<usize, ErrorKind> {
        self.log.push(Access::ReadBlock(start, buf.len()));
        let source: &[u8] = match start {
            0 => &self.id,
            reg::SCAN_CRC => {
                if let Some(frame) = self.frames.pop_front() {
                    self.last_frame = frame;
                }
                &self.last_frame
            }
            _ => return Err(ErrorKind::Other),
        };
        let count = source.len().min(buf.len());
        buf[..count].copy_from_slice(&source[..count]);
        Ok(count)
    }

    async fn write_block(&mut self, start: u8, data: &[u8]) -> Result<(), ErrorKind> {
        self.log.push(Access::WriteBlock(start, data.to_vec()));
        Ok(())
    }

    async fn read_byte(&mut self, register: u8) -> Result<u8, ErrorKind> {
        self.log.push(Access::ReadByte(register));
        match register {
            reg::SYS_CONFIG => Ok(self.sys_config),
            reg::SYS_COMMAND => Ok(self.statuses.pop_front().unwrap_or(0x00)),
            reg::SYS_SMBUS_DATA => Ok(self.smbus_data),
            _ => Err(ErrorKind::Other),
        }
    }

    async fn write_byte(&mut self, register: u8, value: u8) -> Result<(), ErrorKind> {
        self.log.push(Access::WriteByte(register, value));
        match register {
            reg::SYS_CONFIG => {
                self.sys_config = value;
                Ok(())
            }
            _ => Err(ErrorKind::Other),
        }
    }
}

/// Interrupt line that fires `edges` times and then fails.
struct FakeIrq {
    edges: usize,
}

impl PinErrorType for FakeIrq {
    type Error = PinErrorKind;
}

impl Wait for FakeIrq {
    async fn wait_for_high(&mut self) -> Result<(), PinErrorKind> {
        Err(PinErrorKind::Other)
    }

    async fn wait_for_low(&mut self) -> Result<(), PinErrorKind> {
        Err(PinErrorKind::Other)
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), PinErrorKind> {
        Err(PinErrorKind::Other)
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), PinErrorKind> {
        if self.edges == 0 {
            return Err(PinErrorKind::Other);
        }
        self.edges -= 1;
        Ok(())
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), PinErrorKind> {
        Err(PinErrorKind::Other)
    }
}

/// Gives other tasks a chance to run on every sleep.
#[derive(Default)]
struct YieldingDelay;

impl DelayNs for YieldingDelay {
    async fn delay_ns(&mut self, _ns: u32) {
        embassy_futures::yield_now().await;
    }
}

/// Checksummed 6x12 frame with the given (row, col) cells held.
fn frame(held: &[(u8, u8)]) -> Vec<u8> {
    let mut raw = vec![0u8; 13];
    for &(row, col) in held {
        raw[col as usize + 1] |= 1 << row;
    }
    raw[0] = crc8(&raw[1..]);
    raw
}

fn drain(events: &Events) -> Vec<InputEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_receive() {
        drained.push(event);
    }
    drained
}

fn key_events(events: &[InputEvent]) -> Vec<KeyEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            InputEvent::Key(key) => Some(*key),
            _ => None,
        })
        .collect()
}

fn attach(controller: FakeController, events: &Events) -> TestKeyboard<'_> {
    block_on(Keyboard::attach(
        controller,
        YieldingDelay,
        events.sender(),
        &Config::default(),
    ))
    .unwrap()
}

#[test]
fn test_attach_reads_info_and_disables_scan() {
    let events = Events::new();
    let keyboard = attach(FakeController::new(6, 12), &events);

    let info = keyboard.info();
    assert_eq!((info.fw_major, info.fw_minor, info.features), (1, 2, 0x01));
    assert_eq!((info.rows, info.cols), (6, 12));

    let (controller, _, _) = keyboard.release();
    assert!(!controller.scan_enabled());
    assert_eq!(controller.scan_reads(), 0);
    assert_eq!(controller.log[0], Access::ReadBlock(0, reg::INFO_LEN));
}

#[test]
fn test_attach_rejects_unknown_device() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.id[1] = 0x00;

    let result = block_on(TestKeyboard::attach(
        controller,
        YieldingDelay,
        events.sender(),
        &Config::default(),
    ));
    assert!(matches!(
        result,
        Err(Error::UnexpectedDeviceId { hi: 0x4B, lo: 0x00 })
    ));
}

#[test]
fn test_attach_rejects_mismatched_keymap() {
    let events = Events::new();
    let config = Config {
        keymap: KeymapConfig {
            rows: 5,
            cols: 12,
            base: DEFAULT_KEYMAP,
            overlay: DEFAULT_FN_KEYMAP,
            layer_key: KeyCode::FN,
        },
        ..Config::default()
    };

    let result = block_on(TestKeyboard::attach(
        FakeController::new(6, 12),
        YieldingDelay,
        events.sender(),
        &config,
    ));
    match result {
        Err(err) => {
            assert_eq!(
                err,
                Error::MatrixSizeMismatch {
                    device_rows: 6,
                    device_cols: 12,
                    keymap_rows: 5,
                    keymap_cols: 12,
                }
            );
            assert_eq!(
                err.to_string(),
                "keyboard size is 6x12, but keymap is 5x12"
            );
        }
        Ok(_) => panic!("attach should fail"),
    }
}

#[test]
fn test_open_reports_held_keys_and_close_disables_scan() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.frames.push_back(frame(&[(1, 1)]));
    let keyboard = attach(controller, &events);

    block_on(keyboard.open()).unwrap();
    assert_eq!(
        drain(&events),
        [
            InputEvent::Scan(0x11),
            InputEvent::Key(KeyEvent {
                scan_code: 0x11,
                key: KeyCode::Q,
                pressed: true
            }),
            InputEvent::Sync,
        ]
    );

    // A second user neither rescans nor touches the config.
    block_on(keyboard.open()).unwrap();
    assert!(drain(&events).is_empty());
    block_on(keyboard.close()).unwrap();
    assert!(block_on(keyboard.is_open()));

    block_on(keyboard.close()).unwrap();
    assert!(!block_on(keyboard.is_open()));

    let (controller, _, _) = keyboard.release();
    assert!(!controller.scan_enabled());
    assert_eq!(controller.scan_reads(), 1);
}

#[test]
fn test_interrupt_press_and_release() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.frames.push_back(frame(&[]));
    controller.frames.push_back(frame(&[(0, 0)]));
    controller.frames.push_back(frame(&[]));
    let keyboard = attach(controller, &events);

    block_on(keyboard.open()).unwrap();
    assert_eq!(drain(&events), [InputEvent::Sync]);

    assert_eq!(block_on(keyboard.handle_interrupt()), Ok(1));
    assert_eq!(
        drain(&events),
        [
            InputEvent::Scan(0),
            InputEvent::Key(KeyEvent {
                scan_code: 0,
                key: KeyCode::ESC,
                pressed: true
            }),
            InputEvent::Sync,
        ]
    );

    assert_eq!(block_on(keyboard.handle_interrupt()), Ok(1));
    assert_eq!(
        key_events(&drain(&events)),
        [KeyEvent {
            scan_code: 0,
            key: KeyCode::ESC,
            pressed: false
        }]
    );

    // Nothing changed, so only the sync marker.
    assert_eq!(block_on(keyboard.handle_interrupt()), Ok(0));
    assert_eq!(drain(&events), [InputEvent::Sync]);
}

#[test]
fn test_short_read_is_dropped() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.frames.push_back(frame(&[(2, 3)]));
    controller.frames.push_back(frame(&[])[..5].to_vec());
    controller.frames.push_back(frame(&[]));
    let keyboard = attach(controller, &events);

    block_on(keyboard.open()).unwrap();
    drain(&events);

    assert_eq!(
        block_on(keyboard.handle_interrupt()),
        Err(ScanError::ShortRead {
            expected: 13,
            actual: 5
        })
    );
    assert!(drain(&events).is_empty());

    // The release is still seen against the frame before the short read.
    assert_eq!(block_on(keyboard.handle_interrupt()), Ok(1));
    assert_eq!(
        key_events(&drain(&events)),
        [KeyEvent {
            scan_code: 0x23,
            key: KeyCode::D,
            pressed: false
        }]
    );
}

#[test]
fn test_corrupt_frame_is_dropped() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    let mut corrupt = frame(&[(0, 5)]);
    corrupt[0] ^= 0x80;
    controller.frames.push_back(frame(&[]));
    controller.frames.push_back(corrupt);
    let keyboard = attach(controller, &events);

    block_on(keyboard.open()).unwrap();
    drain(&events);

    assert!(matches!(
        block_on(keyboard.handle_interrupt()),
        Err(ScanError::Checksum { .. })
    ));
    assert!(drain(&events).is_empty());
}

#[test]
fn test_scan_while_closed_becomes_open_baseline() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    let held = frame(&[(5, 2), (1, 1)]);
    controller.frames.push_back(held.clone());
    controller.frames.push_back(held);
    controller.frames.push_back(frame(&[(5, 2), (1, 1), (0, 11)]));
    let keyboard = attach(controller, &events);

    // Fn and Q go down while nobody listens.
    assert_eq!(block_on(keyboard.handle_interrupt()), Ok(1));
    assert!(drain(&events).is_empty());
    assert!(block_on(keyboard.layer_active()));

    // The controller still reports the same keys, so the baseline is quiet.
    block_on(keyboard.open()).unwrap();
    assert_eq!(drain(&events), [InputEvent::Sync]);
    assert!(block_on(keyboard.layer_active()));

    // Fn is still held from before the open, so Backspace turns into Delete.
    assert_eq!(block_on(keyboard.handle_interrupt()), Ok(1));
    assert_eq!(
        key_events(&drain(&events)),
        [KeyEvent {
            scan_code: 0x0B,
            key: KeyCode::DELETE,
            pressed: true
        }]
    );

    let (controller, _, _) = keyboard.release();
    assert_eq!(controller.scan_reads(), 3);
}

#[test]
fn test_attach_rejects_overlay_without_layer_key() {
    const BASE: &[KeyEntry] = &[key(0, 0, KeyCode::ESC), key(5, 2, KeyCode::FN)];
    const OVERLAY: &[KeyEntry] = &[key(0, 0, KeyCode::F1)];

    let events = Events::new();
    let config = Config {
        keymap: KeymapConfig {
            rows: 6,
            cols: 12,
            base: BASE,
            overlay: OVERLAY,
            layer_key: KeyCode::FN,
        },
        ..Config::default()
    };

    let result = block_on(TestKeyboard::attach(
        FakeController::new(6, 12),
        YieldingDelay,
        events.sender(),
        &config,
    ));
    match result {
        Err(err) => {
            assert_eq!(
                err,
                Error::Keymap(KeymapError::MissingLayerKey { row: 5, col: 2 })
            );
        }
        Ok(_) => panic!("attach should fail"),
    }
}

#[test]
fn test_run_scans_on_every_falling_edge() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.frames.push_back(frame(&[]));
    controller.frames.push_back(frame(&[(0, 0)]));
    controller.frames.push_back(frame(&[]));
    let keyboard = attach(controller, &events);
    block_on(keyboard.open()).unwrap();
    assert_eq!(drain(&events), [InputEvent::Sync]);

    let mut irq = FakeIrq { edges: 2 };
    match block_on(keyboard.run(&mut irq)) {
        Err(err) => assert_eq!(err, PinErrorKind::Other),
        Ok(never) => match never {},
    }
    assert_eq!(irq.edges, 0);

    let esc = |pressed| KeyEvent {
        scan_code: 0,
        key: KeyCode::ESC,
        pressed,
    };
    assert_eq!(
        drain(&events),
        [
            InputEvent::Scan(0),
            InputEvent::Key(esc(true)),
            InputEvent::Sync,
            InputEvent::Scan(0),
            InputEvent::Key(esc(false)),
            InputEvent::Sync,
        ]
    );

    let (controller, _, _) = keyboard.release();
    assert_eq!(controller.scan_reads(), 3);
}

#[test]
fn test_tunnel_write_and_read() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.statuses.extend([0xA1, 0xA1, 0x00, 0x91, 0x00]);
    controller.smbus_data = 0x3C;
    let keyboard = attach(controller, &events);

    assert_eq!(
        block_on(keyboard.tunnel(Direction::Write, 0x20, 0x01)),
        Ok(None)
    );
    assert_eq!(block_on(keyboard.smbus_read(0x0D)), Ok(0x3C));

    let (controller, _, _) = keyboard.release();
    assert!(controller
        .log
        .contains(&Access::WriteBlock(reg::SYS_SMBUS_COMMAND, vec![0x20, 0x01, 0xA1])));
    assert!(controller
        .log
        .contains(&Access::WriteBlock(reg::SYS_SMBUS_COMMAND, vec![0x0D, 0x00, 0x91])));
    assert_eq!(controller.log.last(), Some(&Access::ReadByte(reg::SYS_SMBUS_DATA)));
}

#[test]
fn test_tunnel_rejection_is_surfaced() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.statuses.extend([0xA1, 0xFF]);
    let keyboard = attach(controller, &events);

    assert_eq!(
        block_on(keyboard.smbus_write(0x10, 0x00)),
        Err(TunnelError::Rejected)
    );
}

#[test]
fn test_smbus_adapter() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.statuses.extend([0x00, 0x00]);
    controller.smbus_data = 0x99;
    let keyboard = attach(controller, &events);

    let mut bus = keyboard.smbus();
    block_on(bus.write(0x1C, &[0x05, 0x06])).unwrap();
    let mut value = [0u8; 1];
    block_on(bus.write_read(0x1C, &[0x07], &mut value)).unwrap();
    assert_eq!(value, [0x99]);

    let mut two = [0u8; 2];
    assert_eq!(
        block_on(bus.write_read(0x1C, &[0x07], &mut two)),
        Err(TunnelError::Unsupported)
    );
}

#[test]
fn test_scan_and_tunnel_do_not_interleave() {
    let events = Events::new();
    let mut controller = FakeController::new(6, 12);
    controller.statuses.extend([0xA1, 0xA1, 0xA1, 0x00]);
    controller.frames.push_back(frame(&[(3, 3)]));
    let keyboard = attach(controller, &events);
    block_on(keyboard.open()).unwrap();
    drain(&events);

    let (tunnelled, scanned) = block_on(join(
        keyboard.tunnel(Direction::Write, 0x01, 0x02),
        keyboard.handle_interrupt(),
    ));
    assert_eq!(tunnelled, Ok(None));
    assert_eq!(scanned, Ok(0));

    let (controller, _, _) = keyboard.release();
    let start = controller
        .log
        .iter()
        .position(|access| matches!(access, Access::WriteBlock(reg::SYS_SMBUS_COMMAND, _)))
        .unwrap();
    // Request plus four status polls, with no scan read in between.
    let exchange = &controller.log[start..start + 5];
    assert!(exchange[1..]
        .iter()
        .all(|access| *access == Access::ReadByte(reg::SYS_COMMAND)));
    assert_eq!(
        controller.log[start + 5],
        Access::ReadBlock(reg::SCAN_CRC, 13)
    );
}
