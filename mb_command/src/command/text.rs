//! NUL-terminated text commands: `DISPLAY_MESSAGE` and
//! `BUILD_START_NOTIFICATION`.
//!
//! A command is dispatched once its terminator is buffered. A full buffer
//! with no terminator can never complete, so its remaining bytes are taken
//! as a truncated string.

use heapless::String;
use mb_common::consts::MAX_TEXT_LEN;
use mb_common::protocol::{ButtonBehavior, MessageOptions};
use mb_common::state::BuildState;
use tracing::{info, warn};

use super::Dispatch;
use crate::controller::{Io, MotionController};
use crate::motion::translator::ExtruderLayout;

/// Fixed prefix of `DISPLAY_MESSAGE`: opcode, options, x, y, timeout.
const MESSAGE_PREFIX: usize = 5;

/// Fixed prefix of `BUILD_START_NOTIFICATION`: opcode, step count.
const BUILD_START_PREFIX: usize = 5;

type Text = String<MAX_TEXT_LEN>;

impl<L: ExtruderLayout> MotionController<L> {
    pub(crate) fn display_message(&mut self, io: &mut Io<'_>, now: u64) -> Dispatch {
        let Some(end) = self.text_end(MESSAGE_PREFIX) else {
            return Dispatch::Deferred;
        };
        self.buffer.pop8();
        let options = MessageOptions::from_bits_truncate(self.buffer.pop8());
        let x = self.buffer.pop8();
        let y = self.buffer.pop8();
        let timeout_s = self.buffer.pop8();
        let text = self.pop_text(end - MESSAGE_PREFIX);

        io.board.show_message(options, x, y, timeout_s, &text);
        let wants_button =
            options.contains(MessageOptions::LAST_FRAGMENT | MessageOptions::WAIT_FOR_BUTTON);
        if wants_button && io.board.has_interface() {
            io.board.wait_for_button(0xff);
            self.mode
                .start_button_wait(now, timeout_s as u16, ButtonBehavior::CLEAR_SCREEN);
        }
        Dispatch::Consumed
    }

    pub(crate) fn build_start(&mut self, io: &mut Io<'_>) -> Dispatch {
        let Some(end) = self.text_end(BUILD_START_PREFIX) else {
            return Dispatch::Deferred;
        };
        self.buffer.pop8();
        let steps = self.buffer.pop32();
        let name = self.pop_text(end - BUILD_START_PREFIX);
        info!(name = name.as_str(), steps, "build started");
        self.build_state = BuildState::Running;
        io.board.build_started(&name);
        Dispatch::Consumed
    }

    /// Buffer index one past the string that starts at `from`, terminator
    /// included.
    fn text_end(&self, from: usize) -> Option<usize> {
        match self.buffer.find_nul(from) {
            Some(nul) => Some(nul + 1),
            None if self.buffer.remaining_capacity() == 0 => {
                warn!("unterminated text fills the buffer, truncating");
                Some(self.buffer.len())
            }
            None => None,
        }
    }

    /// Pop `count` bytes and keep what fits as text.
    fn pop_text(&mut self, count: usize) -> Text {
        let mut text = Text::new();
        for _ in 0..count {
            let byte = self.buffer.pop8();
            if byte == 0 {
                continue;
            }
            let c = if byte.is_ascii() { byte as char } else { '?' };
            // longer strings are truncated
            let _ = text.push(c);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use mb_common::config::MachineConfig;
    use mb_common::protocol::MessageOptions;
    use mb_common::state::{BuildState, ExecutionMode};

    use crate::sim::{BoardEvent, SimMachine, StreamBuilder};

    fn rig() -> SimMachine {
        SimMachine::new(&MachineConfig::default())
    }

    #[test]
    fn message_waits_for_terminator() {
        let mut rig = rig();
        let bytes = StreamBuilder::new()
            .display_message(MessageOptions::LAST_FRAGMENT, 0, 1, 0, "Hello")
            .build();
        let (head, tail) = bytes.split_at(bytes.len() - 1);
        rig.feed(head);
        rig.tick();
        assert_eq!(rig.core.line_number(), 0);
        rig.feed(tail);
        rig.tick();
        assert_eq!(rig.core.line_number(), 1);
        assert!(rig.board.events().contains(&BoardEvent::Message("Hello".into())));
    }

    #[test]
    fn wait_for_button_after_last_fragment() {
        let mut rig = rig();
        rig.board.set_interface(true);
        let options = MessageOptions::LAST_FRAGMENT | MessageOptions::WAIT_FOR_BUTTON;
        rig.feed(&StreamBuilder::new().display_message(options, 0, 0, 5, "Remove part").build());
        rig.tick();
        assert_eq!(rig.core.mode(), ExecutionMode::WaitOnButton);
        rig.board.press_button();
        rig.tick();
        assert_eq!(rig.core.mode(), ExecutionMode::Ready);
        assert_eq!(rig.board.messages_hidden(), 1);
    }

    #[test]
    fn no_button_wait_without_panel() {
        let mut rig = rig();
        let options = MessageOptions::LAST_FRAGMENT | MessageOptions::WAIT_FOR_BUTTON;
        rig.feed(&StreamBuilder::new().display_message(options, 0, 0, 5, "x").build());
        rig.tick();
        assert_eq!(rig.core.mode(), ExecutionMode::Ready);
    }

    #[test]
    fn unterminated_text_in_full_buffer_is_truncated() {
        let mut rig = rig();
        let mut bytes = vec![149, 0, 0, 0, 0];
        bytes.resize(rig.core.buffer().capacity(), b'a');
        rig.feed(&bytes);
        rig.tick();
        assert!(rig.core.buffer().is_empty());
        assert_eq!(rig.core.line_number(), 1);
    }

    #[test]
    fn build_start_sets_running_and_names_job() {
        let mut rig = rig();
        rig.feed(&StreamBuilder::new().build_start(1234, "calibration cube").build());
        rig.tick();
        assert_eq!(rig.core.build_state(), BuildState::Running);
        assert!(rig
            .board
            .events()
            .contains(&BoardEvent::BuildStarted("calibration cube".into())));
    }
}
