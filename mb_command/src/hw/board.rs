//! Board services: clock, operator panel and build notifications.
//!
//! Only [`Board::micros`] is mandatory. A board without an interface panel
//! keeps the defaults, which report no panel and ignore display requests.

use mb_common::protocol::MessageOptions;

pub trait Board {
    /// Monotonic microsecond clock.
    fn micros(&self) -> u64;

    fn seconds(&self) -> u32 {
        (self.micros() / 1_000_000) as u32
    }

    /// An interactive display with buttons is fitted.
    fn has_interface(&self) -> bool {
        false
    }

    /// Arm the panel to report a press of any button in `mask`.
    fn wait_for_button(&mut self, _mask: u8) {}

    /// An armed button was pressed since the last call.
    fn button_pushed(&mut self) -> bool {
        false
    }

    fn show_message(&mut self, _options: MessageOptions, _x: u8, _y: u8, _timeout_s: u8, _text: &str) {}

    fn hide_message(&mut self) {}

    fn set_rgb_led(&mut self, _red: u8, _green: u8, _blue: u8, _blink: u8) {}

    fn buzz(&mut self, _frequency: u16, _duration_ms: u16, _repeats: u8) {}

    fn queue_song(&mut self, _song: u8) {}

    fn build_started(&mut self, _name: &str) {}

    fn build_ended(&mut self, _flags: u8) {}

    /// Latch an error indication (LED pattern, panel banner).
    fn indicate_error(&mut self, _message: &'static str) {}

    /// Full board reset.
    fn reset(&mut self) {}
}
