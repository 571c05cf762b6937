//! Motion controller: the command core's single owner of state.
//!
//! [`MotionController`] owns the command buffer, both state machines, the
//! translator and the safety latch. Collaborators are borrowed per call
//! through [`Io`], so the controller never holds a reference to hardware.
//!
//! ## Tick order ([`MotionController::run_slice`])
//!
//! 1. Honour a latched and armed P-Stop (not while homing or pausing)
//! 2. Pause if the platform has reached the operator's pause height
//! 3. An enter/exit pause chain owns the tick
//! 4. `Paused` / `Error`: nothing is dispatched
//! 5. Resolve completion of the current execution mode
//! 6. `Ready`: dispatch at most one buffered command
//! 7. Clamp the line counter

use std::sync::Arc;

use mb_common::config::MachineConfig;
use mb_common::consts::MAX_LINE_COUNT;
use mb_common::point::{Axis, Point};
use mb_common::protocol::{AxisMask, ButtonBehavior};
use mb_common::state::{BuildState, ExecutionMode, HeaterPolicy, PauseState};
use tracing::{error, info, warn};

use crate::buffer::CommandBuffer;
use crate::hw::{Board, MotionPipeline, PlaybackSource, SettingsStore, Toolhead};
use crate::motion::translator::{DualExtruder, ExtruderLayout, MotionTranslator};
use crate::safety::{HomingSupervisor, HomingTickResult, PStopLatch, StopSignal};
use crate::state::heaters;
use crate::state::mode::{ModeEvent, ModeMachine};
use crate::state::pause::{HeightPause, PauseEvent, PauseIo, PauseWorkflow};
use crate::status::{BuildProgress, StatusSnapshot};

/// Message latched when a P-Stop is honoured.
pub const PSTOP_MESSAGE: &str = "P-Stop triggered";

/// Buzzer frequency [Hz], duration [ms] and repeats sounded when the job
/// pauses itself at the requested height.
const HEIGHT_PAUSE_ALERT: (u16, u16, u8) = (2_000, 300, 3);

/// Collaborators borrowed for one controller call.
pub struct Io<'a> {
    pub pipeline: &'a mut dyn MotionPipeline,
    pub toolhead: &'a mut dyn Toolhead,
    pub settings: &'a mut dyn SettingsStore,
    pub board: &'a mut dyn Board,
}

/// Command-execution and motion-dispatch core.
#[derive(Debug)]
pub struct MotionController<L: ExtruderLayout = DualExtruder> {
    pub(crate) buffer: CommandBuffer,
    pub(crate) mode: ModeMachine,
    pub(crate) pause: PauseWorkflow,
    pub(crate) height_pause: HeightPause,
    pub(crate) translator: MotionTranslator<L>,
    pub(crate) pstop: PStopLatch,
    pub(crate) homing: HomingSupervisor,
    /// Commands executed this job; parks at `MAX_LINE_COUNT + 1`.
    pub(crate) line_number: u32,
    pub(crate) build_state: BuildState,
    pub(crate) progress: BuildProgress,
    /// Tool named by the last `WAIT_FOR_TOOL`.
    pub(crate) wait_tool: u8,
    /// The mirrored half of a ditto tool command has been sent.
    pub(crate) ditto_sent: bool,
    /// Storage playback was active at the last fill.
    pub(crate) playing: bool,
    pub(crate) error_message: Option<&'static str>,
    pub(crate) storage_error: bool,
}

impl<L: ExtruderLayout> MotionController<L> {
    pub fn new(config: &MachineConfig) -> Self {
        Self {
            buffer: CommandBuffer::new(),
            mode: ModeMachine::new(),
            pause: PauseWorkflow::new(config),
            height_pause: HeightPause::new(),
            translator: MotionTranslator::new(config),
            pstop: PStopLatch::new(&config.motion),
            homing: HomingSupervisor::new(),
            line_number: 0,
            build_state: BuildState::Idle,
            progress: BuildProgress::new(),
            wait_tool: 0,
            ditto_sent: false,
            playing: false,
            error_message: None,
            storage_error: false,
        }
    }

    // ── Accessors ──

    /// Handle for asserting a P-Stop from interrupt or signal context.
    pub fn stop_signal(&self) -> Arc<StopSignal> {
        self.pstop.signal()
    }

    #[inline]
    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }

    /// Host-link fill side of the command buffer.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut CommandBuffer {
        &mut self.buffer
    }

    #[inline]
    pub const fn mode(&self) -> ExecutionMode {
        self.mode.mode()
    }

    #[inline]
    pub const fn pause_state(&self) -> PauseState {
        self.pause.state()
    }

    #[inline]
    pub const fn line_number(&self) -> u32 {
        self.line_number
    }

    #[inline]
    pub const fn build_state(&self) -> BuildState {
        self.build_state
    }

    #[inline]
    pub const fn progress(&self) -> &BuildProgress {
        &self.progress
    }

    #[inline]
    pub const fn error_message(&self) -> Option<&'static str> {
        self.error_message
    }

    #[inline]
    pub const fn storage_error(&self) -> bool {
        self.storage_error
    }

    #[inline]
    pub const fn translator(&self) -> &MotionTranslator<L> {
        &self.translator
    }

    #[inline]
    pub const fn pstop(&self) -> &PStopLatch {
        &self.pstop
    }

    /// Host-coordinate position a pause will resume at.
    #[inline]
    pub const fn paused_position(&self) -> Point {
        self.pause.paused_position()
    }

    /// Z height [steps] the job will pause at, if one is set.
    #[inline]
    pub const fn pause_height(&self) -> Option<i32> {
        self.height_pause.target()
    }

    /// The operator considers the job paused (entering, paused or faulted).
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.pause.state().is_paused()
    }

    pub fn status(&self) -> StatusSnapshot {
        let filament = self.translator.filament();
        let mut snapshot = StatusSnapshot {
            mode: self.mode.mode(),
            pause_state: self.pause.state(),
            error_message: self.error_message.map(str::to_owned),
            build_state: self.build_state,
            build_percent: self.progress.percent(),
            seconds_remaining: self.progress.seconds_remaining(),
            line_number: self.line_number,
            filament_steps: [0; 2],
            filament_last_steps: [0; 2],
            filament_mm: [0.0; 2],
            filament_last_mm: [0.0; 2],
            tool: self.translator.tool(),
            ditto: self.translator.ditto(),
            speed_factor: self.translator.speed_factor(),
            pause_height: self.height_pause.target(),
        };
        for e in 0..2 {
            let axis = self.translator.axis_config(Axis::extruder(e));
            snapshot.filament_steps[e] = filament.length(e);
            snapshot.filament_last_steps[e] = filament.last_length(e);
            snapshot.filament_mm[e] = axis.steps_to_mm(filament.length(e));
            snapshot.filament_last_mm[e] = axis.steps_to_mm(filament.last_length(e));
        }
        snapshot
    }

    // ── Job lifecycle ──

    /// Job-start reset.
    pub fn reset(&mut self, io: &mut Io<'_>) {
        self.buffer.reset();
        self.mode.reset();
        self.pause.reset();
        self.height_pause = HeightPause::new();
        self.pstop.reset();
        self.homing.reset();
        self.translator.reset(io.settings);
        self.translator.change_tool(0);
        self.line_number = 0;
        self.build_state = BuildState::Idle;
        self.progress.reset();
        self.wait_tool = 0;
        self.ditto_sent = false;
        self.error_message = None;
        self.storage_error = false;
        info!(ditto = self.translator.ditto(), "command core reset");
    }

    /// Keep the job's results and get ready to run it again.
    pub fn build_another_copy(&mut self, io: &mut Io<'_>) {
        self.buffer.reset();
        let filament = self.translator.filament_mut();
        filament.commit(io.settings);
        filament.clear_last();
    }

    /// Request a pause (`begin`) or a resume. Also drops a latched P-Stop
    /// so it cannot immediately re-pause the job.
    pub fn pause(&mut self, begin: bool, policy: HeaterPolicy) -> bool {
        self.pstop.clear_latch();
        self.pause.request(begin, policy)
    }

    /// Pause or resume with the operator's stored heater policy.
    pub fn pause_with_stored_policy(&mut self, begin: bool, settings: &dyn SettingsStore) -> bool {
        self.pause(begin, settings.heater_pause_policy())
    }

    /// Pause once the platform reaches `z_steps` (host coordinates), or
    /// forget the height with `None`.
    pub fn set_pause_height(&mut self, pipeline: &dyn MotionPipeline, z_steps: Option<i32>) {
        let current_z = self.translator.planner_position(pipeline)[Axis::Z];
        self.height_pause.set(z_steps, current_z);
        info!(?z_steps, current_z, "pause height");
    }

    /// Scale accelerated host moves queued from now on. Returns the factor
    /// in use after clamping.
    pub fn set_speed_factor(&mut self, factor: f32) -> f32 {
        self.translator.set_speed_factor(factor)
    }

    /// Skip the unretraction of the coming resume.
    pub fn clear_unretract(&mut self) {
        self.pause.clear_unretract();
    }

    /// Stop the job: heaters off first, then park through the pause chain
    /// and discard what is left once parked.
    pub fn cancel_build(&mut self, io: &mut Io<'_>) {
        if matches!(self.build_state, BuildState::Cancelling | BuildState::Cancelled) {
            return;
        }
        heaters::all_off(io.toolhead, self.translator.tool_count());
        self.build_state = BuildState::Cancelling;
        info!(pause = ?self.pause.state(), "cancelling build");
        match self.pause.state() {
            PauseState::None => {
                self.pause(true, HeaterPolicy::ExtrudersAndPlatformOff);
            }
            PauseState::Paused => self.finish_cancel(io),
            // a resume in flight must not bring the heaters back
            s if s.is_exiting() => self.pause.discard_heater_snapshot(),
            // mid-chain: finishes when the chain settles
            _ => {}
        }
    }

    /// Operator acknowledged a pause `Error`. The job is treated as cancelled.
    pub fn clear_pause_error(&mut self) -> bool {
        if !self.pause.clear_error() {
            return false;
        }
        self.error_message = None;
        self.storage_error = false;
        self.buffer.reset();
        self.mode.reset();
        if self.build_state != BuildState::Idle {
            self.build_state = BuildState::Cancelled;
        }
        true
    }

    fn finish_cancel(&mut self, io: &mut Io<'_>) {
        heaters::all_off(io.toolhead, self.translator.tool_count());
        self.buffer.reset();
        self.pause.reset();
        self.mode.reset();
        self.build_state = BuildState::Cancelled;
        info!("build cancelled");
    }

    // ── Storage playback ──

    /// Top up the command buffer from a storage-card job and handle its end.
    pub fn fill_from_storage(&mut self, io: &mut Io<'_>, source: &mut dyn PlaybackSource) {
        self.playing = source.is_playing();
        if !self.playing {
            return;
        }
        while self.buffer.remaining_capacity() > 0 && source.has_next() {
            if self.buffer.push(source.next_byte()).is_err() {
                break;
            }
        }
        if source.has_next() {
            return;
        }
        match source.status() {
            Ok(()) => {
                info!(line = self.line_number, "playback finished");
                source.finish();
                self.playing = false;
            }
            Err(fault) if self.pause.state() == PauseState::None => {
                error!(%fault, "storage fault, shutting down build");
                self.translator.filament_mut().commit(io.settings);
                heaters::all_off(io.toolhead, self.translator.tool_count());
                self.translator.enable_axes(io.pipeline, AxisMask::all(), false);
                self.buffer.reset();
                self.storage_error = true;
                self.error_message = Some(fault.message());
                io.board.indicate_error(fault.message());
                source.finish();
                self.playing = false;
                self.cancel_build(io);
            }
            Err(_) => {}
        }
    }

    // ── Scheduler slice ──

    /// One scheduler tick.
    pub fn run_slice(&mut self, io: &mut Io<'_>) {
        let now = io.board.micros();

        if self.pstop.is_latched()
            && self.mode.mode() != ExecutionMode::Homing
            && self.pause.state() == PauseState::None
            && self.pstop.take_if_armed()
        {
            warn!("P-Stop honoured, pausing with heaters off");
            self.error_message = Some(PSTOP_MESSAGE);
            self.pause.request(true, HeaterPolicy::ExtrudersAndPlatformOff);
        }

        let z = self.translator.planner_position(io.pipeline)[Axis::Z];
        if self.height_pause.check(z, self.pause.state() == PauseState::None) {
            info!(z, line = self.line_number, "pause height reached");
            self.pause.request(true, HeaterPolicy::LeaveOn);
            let (frequency, duration_ms, repeats) = HEIGHT_PAUSE_ALERT;
            io.board.buzz(frequency, duration_ms, repeats);
            return;
        }

        match self.pause.state() {
            s if s.is_intermediate() => {
                self.tick_pause(io);
                return;
            }
            PauseState::Paused | PauseState::Error => return,
            _ => {}
        }

        self.resolve_mode(io, now);

        if self.mode.is_ready() && !self.buffer.is_empty() {
            self.dispatch_next(io, now);
        }

        if self.line_number > MAX_LINE_COUNT {
            self.line_number = MAX_LINE_COUNT + 1;
        }
    }

    fn tick_pause(&mut self, io: &mut Io<'_>) {
        let has_interface = io.board.has_interface();
        let mut pause_io = PauseIo {
            translator: &mut self.translator,
            pipeline: &mut *io.pipeline,
            toolhead: &mut *io.toolhead,
            storage_error: self.storage_error,
            has_interface,
        };
        let Some(event) = self.pause.tick(&mut pause_io) else {
            return;
        };
        match event {
            PauseEvent::Paused if self.build_state == BuildState::Cancelling => self.finish_cancel(io),
            PauseEvent::Paused => info!("paused"),
            PauseEvent::Errored => {
                error!(message = self.error_message.unwrap_or(""), "pause ended in error");
            }
            PauseEvent::Resumed => {
                self.error_message = None;
                self.storage_error = false;
                self.pstop.clear_latch();
                if self.build_state == BuildState::Cancelling {
                    self.finish_cancel(io);
                } else {
                    info!("resumed");
                }
            }
        }
    }

    fn resolve_mode(&mut self, io: &mut Io<'_>, now: u64) {
        use ExecutionMode as M;

        let done = match self.mode.mode() {
            M::Ready => false,
            M::Moving => !io.pipeline.is_running(),
            M::Delay => self.mode.delay_elapsed(now),
            M::Homing => match self.homing.tick(now, io.pipeline.is_running()) {
                HomingTickResult::InProgress => false,
                HomingTickResult::Complete | HomingTickResult::TimedOut => {
                    self.translator.end_homing(io.pipeline);
                    true
                }
            },
            M::WaitOnTool => self.mode.tool_wait_elapsed(now) || self.tools_ready(io),
            M::WaitOnPlatform => {
                self.mode.tool_wait_elapsed(now) || io.toolhead.is_platform_ready().unwrap_or(false)
            }
            M::WaitOnButton => self.button_resolved(io, now),
        };
        if done {
            self.mode.handle_event(ModeEvent::Completed);
        }
    }

    /// The awaited tool, and under ditto its twin, are at temperature.
    fn tools_ready(&self, io: &mut Io<'_>) -> bool {
        if !io.toolhead.is_tool_ready(self.wait_tool).unwrap_or(false) {
            return false;
        }
        if self.translator.ditto() {
            // an unreachable twin does not hold the job
            return io.toolhead.is_tool_ready(self.wait_tool ^ 1).unwrap_or(true);
        }
        true
    }

    fn button_resolved(&self, io: &mut Io<'_>, now: u64) -> bool {
        let behavior = self.mode.button_behavior();
        if self.mode.button_wait_elapsed(now) {
            if behavior.contains(ButtonBehavior::ABORT_ON_TIMEOUT) {
                warn!("button wait timed out, resetting board");
                io.board.reset();
            }
            return true;
        }
        if io.board.button_pushed() {
            if behavior.contains(ButtonBehavior::CLEAR_SCREEN) {
                io.board.hide_message();
            }
            return true;
        }
        false
    }
}
