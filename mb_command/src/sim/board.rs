//! Simulated board: a manual clock and an event log.

use mb_common::protocol::MessageOptions;

use crate::hw::Board;

/// Everything the core asked the board to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    Message(String),
    HideMessage,
    WaitForButton(u8),
    RgbLed { red: u8, green: u8, blue: u8, blink: u8 },
    Buzz { frequency: u16, duration_ms: u16, repeats: u8 },
    Song(u8),
    BuildStarted(String),
    BuildEnded(u8),
    Error(&'static str),
    Reset,
}

#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    now_us: u64,
    interface: bool,
    button_pending: bool,
    events: Vec<BoardEvent>,
}

impl SimBoard {
    /// A board without an interface panel, clock at zero.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, us: u64) {
        self.now_us = self.now_us.saturating_add(us);
    }

    pub fn set_interface(&mut self, present: bool) {
        self.interface = present;
    }

    /// The next `button_pushed` poll reports a press.
    pub fn press_button(&mut self) {
        self.button_pending = true;
    }

    pub fn events(&self) -> &[BoardEvent] {
        &self.events
    }

    pub fn messages_hidden(&self) -> usize {
        self.count(|e| matches!(e, BoardEvent::HideMessage))
    }

    pub fn resets(&self) -> usize {
        self.count(|e| matches!(e, BoardEvent::Reset))
    }

    fn count(&self, f: impl Fn(&BoardEvent) -> bool) -> usize {
        self.events.iter().filter(|e| f(e)).count()
    }
}

impl Board for SimBoard {
    fn micros(&self) -> u64 {
        self.now_us
    }

    fn has_interface(&self) -> bool {
        self.interface
    }

    fn wait_for_button(&mut self, mask: u8) {
        self.button_pending = false;
        self.events.push(BoardEvent::WaitForButton(mask));
    }

    fn button_pushed(&mut self) -> bool {
        std::mem::take(&mut self.button_pending)
    }

    fn show_message(&mut self, _options: MessageOptions, _x: u8, _y: u8, _timeout_s: u8, text: &str) {
        self.events.push(BoardEvent::Message(text.to_owned()));
    }

    fn hide_message(&mut self) {
        self.events.push(BoardEvent::HideMessage);
    }

    fn set_rgb_led(&mut self, red: u8, green: u8, blue: u8, blink: u8) {
        self.events.push(BoardEvent::RgbLed { red, green, blue, blink });
    }

    fn buzz(&mut self, frequency: u16, duration_ms: u16, repeats: u8) {
        self.events.push(BoardEvent::Buzz { frequency, duration_ms, repeats });
    }

    fn queue_song(&mut self, song: u8) {
        self.events.push(BoardEvent::Song(song));
    }

    fn build_started(&mut self, name: &str) {
        self.events.push(BoardEvent::BuildStarted(name.to_owned()));
    }

    fn build_ended(&mut self, flags: u8) {
        self.events.push(BoardEvent::BuildEnded(flags));
    }

    fn indicate_error(&mut self, message: &'static str) {
        self.events.push(BoardEvent::Error(message));
    }

    fn reset(&mut self) {
        self.events.push(BoardEvent::Reset);
    }
}
