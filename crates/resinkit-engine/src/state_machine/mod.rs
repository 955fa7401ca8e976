//! Printer state machine
//!
//! The machine owns only the state and its history (where to resume after a
//! door closes, a cancel is declined or the version screen is dismissed).
//! Everything with a side effect goes through [`PrinterActions`], which the
//! print engine implements; tests substitute a recording fake.
//!
//! Processing is run-to-completion: events posted while an event is being
//! handled, including events posted by entry actions, are queued behind it
//! and handled in order before [`PrinterStateMachine::handle`] returns.
//!
//! A transition runs the old state's exit actions, broadcasts `Leaving`,
//! sets the new state's UI substate (and, for `Error`, the pending error
//! code), broadcasts `Entering` and then runs the new state's entry actions.

pub mod events;

pub use events::PrinterEvent;

use resinkit_communication::HighLevelMotorCommand;
use resinkit_core::{PrintEngineState, PrintRating, StateChange, UiSubState};
use resinkit_settings::CurrentLayerSettings;

use PrintEngineState as S;
use PrinterEvent as E;

/// Image shown while the printer is idle in a projector test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pattern {
    #[default]
    Test,
    Calibration,
}

/// How a print ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintOutcome {
    Completed,
    Canceled,
    Failed,
}

/// Conditions sampled once at boot
#[derive(Debug, Clone, Copy, Default)]
pub struct BootConditions {
    pub demo_mode: bool,
    pub door_open: bool,
}

/// Side effects and queries the state machine needs from the print engine
pub trait PrinterActions {
    /// Queue an event behind the one being handled
    fn post(&mut self, event: PrinterEvent);

    fn take_posted(&mut self) -> Option<PrinterEvent>;

    /// Publish the status for `state`
    fn broadcast(&mut self, state: PrintEngineState, change: StateChange);

    fn set_ui_sub_state(&mut self, sub_state: UiSubState);

    /// Move the pending fatal error into the status
    fn apply_pending_error(&mut self);

    fn clear_error(&mut self);

    /// Reset the motor controller; false after a failure was reported
    fn initialize_motors(&mut self) -> bool;

    /// Send a motion and arm its timeout; false after a failure was reported
    fn send_motor_command(&mut self, command: HighLevelMotorCommand) -> bool;

    fn pause_motion(&mut self);

    fn resume_motion(&mut self);

    /// Drop queued controller commands, best effort
    fn clear_pending_motion(&mut self);

    /// Start the delay timer; a zero delay ends immediately
    fn start_delay(&mut self, seconds: f64);

    fn start_exposure(&mut self);

    fn end_exposure(&mut self);

    /// Stop the delay and exposure timers, keeping their remaining time
    fn pause_timers(&mut self);

    /// Restart the timer [`PrinterActions::pause_timers`] stopped in `state`
    ///
    /// If nothing was left to run, the timer's end event is posted.
    fn resume_timers(&mut self, state: PrintEngineState);

    fn show_pattern(&mut self, pattern: Pattern);

    fn projector_off(&mut self);

    fn upgrade_projector(&mut self) -> bool;

    fn has_print_data(&self) -> bool;

    /// Validate and set up a print; false after a failure was reported
    fn try_start_print(&mut self) -> bool;

    fn next_layer(&mut self);

    fn has_more_layers(&self) -> bool;

    fn layer_settings(&self) -> &CurrentLayerSettings;

    fn load_next_layer_image(&mut self);

    fn clear_rotation_flag(&mut self);

    fn rotation_detected(&self) -> bool;

    fn jam_detection_enabled(&self) -> bool;

    fn max_unjam_tries(&self) -> u32;

    fn calibrate_before_print(&self) -> bool;

    fn collects_feedback(&self) -> bool;

    fn set_print_rating(&mut self, rating: PrintRating);

    fn clear_print(&mut self, outcome: PrintOutcome);

    fn set_registered(&mut self);
}

#[derive(Debug, Clone)]
pub struct PrinterStateMachine {
    state: PrintEngineState,
    door_open: bool,
    door_resume: PrintEngineState,
    door_clears_print: bool,
    cancel_resume: PrintEngineState,
    completed_while_confirming: Option<PrinterEvent>,
    version_return: PrintEngineState,
    unjam_tries_left: u32,
    approach_after_jam: bool,
    pause_requested: bool,
    home_sub_state: Option<UiSubState>,
    pattern: Pattern,
    started: bool,
}

impl Default for PrinterStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterStateMachine {
    pub fn new() -> Self {
        Self {
            state: S::Initializing,
            door_open: false,
            door_resume: S::Initializing,
            door_clears_print: false,
            cancel_resume: S::Home,
            completed_while_confirming: None,
            version_return: S::Home,
            unjam_tries_left: 0,
            approach_after_jam: false,
            pause_requested: false,
            home_sub_state: None,
            pattern: Pattern::Test,
            started: false,
        }
    }

    pub fn state(&self) -> PrintEngineState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn unjam_tries_left(&self) -> u32 {
        self.unjam_tries_left
    }

    pub fn pause_requested(&self) -> bool {
        self.pause_requested
    }

    /// Enter the initial state
    pub fn start(&mut self, boot: BootConditions, ctx: &mut dyn PrinterActions) {
        self.door_open = boot.door_open;
        self.state = if boot.demo_mode {
            S::DemoMode
        } else if boot.door_open {
            self.door_resume = S::Initializing;
            S::DoorOpen
        } else {
            S::Initializing
        };
        self.started = true;
        tracing::info!("Printer state machine starting in {}", self.state);
        self.enter(ctx);
        self.process_posted(ctx);
    }

    /// Handle an event and everything it posts
    pub fn handle(&mut self, event: PrinterEvent, ctx: &mut dyn PrinterActions) {
        if !self.started {
            tracing::warn!("Event {} before the state machine started", event);
            return;
        }
        ctx.post(event);
        self.process_posted(ctx);
    }

    /// Handle events already posted, e.g. a fatal error raised outside of
    /// event handling
    pub fn process_posted(&mut self, ctx: &mut dyn PrinterActions) {
        if !self.started {
            return;
        }
        while let Some(event) = ctx.take_posted() {
            self.dispatch(event, ctx);
        }
    }

    fn dispatch(&mut self, event: PrinterEvent, ctx: &mut dyn PrinterActions) {
        tracing::trace!("{} in {}", event, self.state);
        match event {
            E::Fatal => return self.fatal(ctx),
            E::DoorOpened => return self.door_opened(ctx),
            E::DoorClosed => return self.door_closed(ctx),
            _ => {}
        }

        let state = self.state;
        match (state, event) {
            (S::Initializing, E::Initialized) => self.transition(S::Homing, ctx),

            (S::Homing, E::MotionCompleted) => self.transition(S::Home, ctx),

            (S::Home, E::Start | E::Button2) => {
                if ctx.try_start_print() {
                    self.pause_requested = false;
                    self.transition(S::MovingToStartPosition, ctx);
                }
            }
            (S::Home, E::Button1Hold | E::Button2Hold) => self.show_version(ctx),
            (S::Home, E::ShowTest) => {
                self.pattern = Pattern::Test;
                self.transition(S::ShowingTestPattern, ctx);
            }
            (S::Home, E::ShowCalImage) => {
                self.pattern = Pattern::Calibration;
                self.transition(S::ShowingTestPattern, ctx);
            }
            (S::Home, E::StartRegistering) => self.transition(S::Registering, ctx),
            (S::Home, E::UpgradeProjector) => self.transition(S::ConfirmUpgrade, ctx),
            (S::Home | S::Error | S::DemoMode, E::Reset) => self.reinitialize(ctx),

            (S::MovingToStartPosition, E::MotionCompleted) => {
                if ctx.calibrate_before_print() {
                    self.transition(S::Calibrating, ctx);
                } else {
                    self.transition(S::InitializingLayer, ctx);
                }
            }
            (S::Calibrating, E::Resume | E::Button2) => {
                self.transition(S::InitializingLayer, ctx)
            }

            (S::InitializingLayer, E::LayerReady) => {
                if ctx.layer_settings().params.press_microns > 0 {
                    self.transition(S::Pressing, ctx);
                } else {
                    self.transition(S::PreExposureDelay, ctx);
                }
            }
            (S::Pressing, E::MotionCompleted) => self.transition(S::PressDelay, ctx),
            (S::PressDelay, E::DelayEnded) => self.transition(S::Unpressing, ctx),
            (S::Unpressing, E::MotionCompleted) => self.transition(S::PreExposureDelay, ctx),
            (S::PreExposureDelay, E::DelayEnded) => self.transition(S::Exposing, ctx),
            (S::Exposing, E::ExposureEnded) => self.transition(S::Separating, ctx),
            (S::Separating, E::MotionCompleted) => self.separated(ctx),
            (S::Unjamming, E::MotionCompleted) => self.unjam_attempted(ctx),
            (S::Jammed, E::Resume | E::Button2) => {
                self.approach_after_jam = true;
                self.transition(S::Approaching, ctx);
            }
            (S::Approaching, E::MotionCompleted) => self.approached(ctx),
            (S::MovingToPause, E::MotionCompleted) => self.transition(S::Paused, ctx),
            (S::Paused, E::Resume | E::Button2) => self.transition(S::MovingToResume, ctx),
            (S::MovingToResume, E::MotionCompleted) => self.transition(S::InitializingLayer, ctx),

            (s, E::Pause | E::Button2) if s.is_layer_sequence() => self.request_pause(ctx),
            (s, E::Cancel | E::Button1) if s.is_printing() && Self::cancelable(s) => {
                self.request_cancel(ctx)
            }

            (S::ConfirmCancel, E::Cancel | E::Button1) => {
                self.transition(S::AwaitingCancelation, ctx)
            }
            (S::ConfirmCancel, E::Resume | E::Button2) => self.decline_cancel(ctx),
            (S::ConfirmCancel, E::MotionCompleted | E::DelayEnded | E::ExposureEnded) => {
                if Self::awaited_by(self.cancel_resume, event) {
                    tracing::debug!("{} arrived while confirming cancel", event);
                    self.completed_while_confirming = Some(event);
                } else {
                    tracing::warn!(
                        "{}: {} while confirming cancel of {}",
                        resinkit_core::ErrorCode::UnexpectedEvent,
                        event,
                        self.cancel_resume
                    );
                }
            }
            (S::AwaitingCancelation, E::MotionCompleted) => {
                ctx.clear_print(PrintOutcome::Canceled);
                self.home_sub_state = Some(UiSubState::PrintCanceled);
                self.transition(S::Homing, ctx);
            }

            (S::GettingFeedback, E::Button2) => self.rate_print(PrintRating::Succeeded, ctx),
            (S::GettingFeedback, E::Button1) => self.rate_print(PrintRating::Failed, ctx),

            (S::Error, E::Button1 | E::Button2) => self.reinitialize(ctx),
            (S::Error, E::Button1Hold | E::Button2Hold) => self.show_version(ctx),
            (S::ShowingVersion, e) if e.is_button() => {
                let target = self.version_return;
                self.transition(target, ctx);
            }

            (S::Registering, E::RegistrationSucceeded) => {
                ctx.set_registered();
                self.home_sub_state = Some(UiSubState::Registered);
                self.transition(S::Home, ctx);
            }
            (S::Registering, E::Button1 | E::Cancel) => self.transition(S::Home, ctx),

            (S::ConfirmUpgrade, E::Button2) => self.transition(S::UpgradingProjector, ctx),
            (S::ConfirmUpgrade, E::Button1 | E::Cancel) => self.transition(S::Home, ctx),
            (S::UpgradingProjector, E::UpgradeSucceeded) => {
                self.transition(S::UpgradeComplete, ctx)
            }
            (S::UpgradeComplete, e) if e.is_button() || e == E::Reset => {
                self.transition(S::Initializing, ctx)
            }

            (S::ShowingTestPattern, e)
                if e.is_button() || matches!(e, E::Reset | E::ShowTest | E::ShowCalImage) =>
            {
                self.transition(S::Home, ctx)
            }

            (state, event) => {
                tracing::warn!(
                    "{}: {} in {}",
                    resinkit_core::ErrorCode::UnexpectedEvent,
                    event,
                    state
                );
            }
        }
    }

    fn cancelable(state: PrintEngineState) -> bool {
        !matches!(state, S::ConfirmCancel | S::AwaitingCancelation | S::InitializingLayer)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    fn transition(&mut self, next: PrintEngineState, ctx: &mut dyn PrinterActions) {
        tracing::debug!("{} -> {}", self.state, next);
        self.exit(ctx);
        self.state = next;
        self.enter(ctx);
    }

    fn exit(&mut self, ctx: &mut dyn PrinterActions) {
        match self.state {
            S::Exposing => ctx.end_exposure(),
            S::Error => ctx.clear_error(),
            S::DemoMode | S::ShowingTestPattern => ctx.projector_off(),
            _ => {}
        }
        ctx.broadcast(self.state, StateChange::Leaving);
    }

    fn enter(&mut self, ctx: &mut dyn PrinterActions) {
        self.announce(ctx);
        self.entry_actions(ctx);
    }

    /// Enter the current state without running its entry actions
    fn announce(&mut self, ctx: &mut dyn PrinterActions) {
        let sub_state = self.entry_sub_state(ctx);
        ctx.set_ui_sub_state(sub_state);
        if self.state == S::Error {
            ctx.apply_pending_error();
        }
        ctx.broadcast(self.state, StateChange::Entering);
    }

    fn entry_sub_state(&mut self, ctx: &dyn PrinterActions) -> UiSubState {
        match self.state {
            S::Home => self.home_sub_state.take().unwrap_or(if ctx.has_print_data() {
                UiSubState::HavePrintData
            } else {
                UiSubState::NoPrintData
            }),
            S::Unjamming | S::Jammed => UiSubState::RotationJammed,
            s if self.pause_requested && (s.is_layer_sequence() || s == S::InitializingLayer) => {
                UiSubState::AboutToPause
            }
            _ => UiSubState::None,
        }
    }

    fn entry_actions(&mut self, ctx: &mut dyn PrinterActions) {
        match self.state {
            S::Initializing => {
                if ctx.initialize_motors() {
                    ctx.post(E::Initialized);
                }
            }
            S::Homing => {
                ctx.clear_pending_motion();
                ctx.send_motor_command(HighLevelMotorCommand::GoHome);
            }
            S::MovingToStartPosition => {
                ctx.send_motor_command(HighLevelMotorCommand::MoveToStartPosition);
            }
            S::InitializingLayer => {
                ctx.next_layer();
                ctx.post(E::LayerReady);
            }
            S::Pressing => {
                ctx.send_motor_command(HighLevelMotorCommand::Press);
            }
            S::PressDelay => {
                let wait = ctx.layer_settings().params.press_wait_sec;
                ctx.start_delay(wait);
            }
            S::Unpressing => {
                ctx.send_motor_command(HighLevelMotorCommand::Unpress);
            }
            S::PreExposureDelay => {
                let wait = ctx.layer_settings().params.approach_wait_sec;
                ctx.start_delay(wait);
            }
            S::Exposing => ctx.start_exposure(),
            S::Separating => {
                ctx.clear_rotation_flag();
                ctx.load_next_layer_image();
                ctx.send_motor_command(HighLevelMotorCommand::Separate);
            }
            S::Unjamming => {
                ctx.clear_rotation_flag();
                ctx.send_motor_command(HighLevelMotorCommand::RecoverFromJam);
            }
            S::Approaching => {
                let command = if std::mem::take(&mut self.approach_after_jam) {
                    HighLevelMotorCommand::ApproachAfterJam
                } else {
                    HighLevelMotorCommand::Approach
                };
                ctx.send_motor_command(command);
            }
            S::MovingToPause => {
                self.pause_requested = false;
                ctx.send_motor_command(HighLevelMotorCommand::PauseAndInspect);
            }
            S::MovingToResume => {
                ctx.send_motor_command(HighLevelMotorCommand::ResumeFromInspect);
            }
            S::AwaitingCancelation => {
                ctx.send_motor_command(HighLevelMotorCommand::CancelMotion);
            }
            S::Error => {
                self.home_sub_state = None;
                self.pause_requested = false;
                ctx.clear_print(PrintOutcome::Failed);
                ctx.projector_off();
                ctx.clear_pending_motion();
            }
            S::UpgradingProjector => {
                if ctx.upgrade_projector() {
                    ctx.post(E::UpgradeSucceeded);
                }
            }
            S::DemoMode => ctx.show_pattern(Pattern::Test),
            S::ShowingTestPattern => ctx.show_pattern(self.pattern),
            S::DoorOpen
            | S::Home
            | S::Calibrating
            | S::Jammed
            | S::Paused
            | S::ConfirmCancel
            | S::GettingFeedback
            | S::ShowingVersion
            | S::Registering
            | S::ConfirmUpgrade
            | S::UpgradeComplete => {}
        }
    }

    // -------------------------------------------------------------------------
    // Layer sequence
    // -------------------------------------------------------------------------

    fn separated(&mut self, ctx: &mut dyn PrinterActions) {
        if ctx.jam_detection_enabled() && !ctx.rotation_detected() {
            self.unjam_tries_left = ctx.max_unjam_tries();
            tracing::warn!(
                "No rotation seen during separation, {} unjam attempts allowed",
                self.unjam_tries_left
            );
            if self.unjam_tries_left == 0 {
                self.transition(S::Jammed, ctx);
            } else {
                self.transition(S::Unjamming, ctx);
            }
        } else {
            self.transition(S::Approaching, ctx);
        }
    }

    fn unjam_attempted(&mut self, ctx: &mut dyn PrinterActions) {
        if ctx.rotation_detected() {
            tracing::info!("Tray rotation recovered");
            self.approach_after_jam = true;
            self.transition(S::Approaching, ctx);
            return;
        }
        self.unjam_tries_left = self.unjam_tries_left.saturating_sub(1);
        if self.unjam_tries_left == 0 {
            tracing::warn!("Unjamming failed, waiting for the user");
            self.transition(S::Jammed, ctx);
        } else {
            tracing::debug!("Still jammed, {} attempts left", self.unjam_tries_left);
            self.transition(S::Unjamming, ctx);
        }
    }

    fn approached(&mut self, ctx: &mut dyn PrinterActions) {
        if ctx.has_more_layers() {
            if self.pause_requested {
                self.transition(S::MovingToPause, ctx);
            } else {
                self.transition(S::InitializingLayer, ctx);
            }
            return;
        }
        ctx.clear_print(PrintOutcome::Completed);
        self.pause_requested = false;
        self.home_sub_state = Some(UiSubState::PrintCompleted);
        if ctx.collects_feedback() {
            self.transition(S::GettingFeedback, ctx);
        } else {
            self.transition(S::Homing, ctx);
        }
    }

    fn request_pause(&mut self, ctx: &mut dyn PrinterActions) {
        if self.pause_requested {
            return;
        }
        tracing::info!("Pause requested in {}", self.state);
        self.pause_requested = true;
        ctx.set_ui_sub_state(UiSubState::AboutToPause);
        ctx.broadcast(self.state, StateChange::NoChange);
    }

    fn rate_print(&mut self, rating: PrintRating, ctx: &mut dyn PrinterActions) {
        ctx.set_print_rating(rating);
        self.transition(S::Homing, ctx);
    }

    fn show_version(&mut self, ctx: &mut dyn PrinterActions) {
        self.version_return = self.state;
        self.transition(S::ShowingVersion, ctx);
    }

    // -------------------------------------------------------------------------
    // Cancellation
    // -------------------------------------------------------------------------

    fn request_cancel(&mut self, ctx: &mut dyn PrinterActions) {
        self.cancel_resume = self.state;
        self.completed_while_confirming = None;
        if self.state.is_moving() {
            ctx.pause_motion();
        }
        ctx.pause_timers();
        self.transition(S::ConfirmCancel, ctx);
    }

    /// Whether `state` is waiting for `event` to move on
    fn awaited_by(state: PrintEngineState, event: PrinterEvent) -> bool {
        match event {
            E::MotionCompleted => state.is_moving(),
            E::DelayEnded => matches!(state, S::PressDelay | S::PreExposureDelay),
            E::ExposureEnded => state == S::Exposing,
            _ => false,
        }
    }

    fn decline_cancel(&mut self, ctx: &mut dyn PrinterActions) {
        let target = self.cancel_resume;
        let completed = self.completed_while_confirming.take();
        tracing::info!("Cancel declined, resuming {}", target);
        match target {
            S::Unjamming => {
                // The recovery motion cannot be picked up mid-way
                ctx.clear_pending_motion();
                self.transition(S::Jammed, ctx);
            }
            S::Paused | S::Jammed | S::Calibrating => self.transition(target, ctx),
            _ => {
                self.exit(ctx);
                self.state = target;
                self.announce(ctx);
                if let Some(event) = completed {
                    ctx.post(event);
                } else if target.is_moving() {
                    ctx.resume_motion();
                } else {
                    ctx.resume_timers(target);
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // Door and errors
    // -------------------------------------------------------------------------

    fn door_opened(&mut self, ctx: &mut dyn PrinterActions) {
        self.door_open = true;
        let state = self.state;
        match state {
            S::DoorOpen => return,
            S::Error => {
                // Stay in Error; reset waits for the door to close
                tracing::info!("Door opened in error state");
                return;
            }
            s if s.is_printing() || s.is_moving() => {
                if s.is_moving() {
                    ctx.pause_motion();
                }
                ctx.pause_timers();
                self.door_resume = S::Homing;
                self.door_clears_print = s.is_printing();
            }
            S::ShowingTestPattern => self.door_resume = S::Home,
            s => self.door_resume = s,
        }
        tracing::info!("Door opened in {}", state);
        self.transition(S::DoorOpen, ctx);
    }

    fn door_closed(&mut self, ctx: &mut dyn PrinterActions) {
        self.door_open = false;
        if self.state != S::DoorOpen {
            tracing::debug!("Door closed in {}", self.state);
            return;
        }
        if std::mem::take(&mut self.door_clears_print) {
            ctx.clear_print(PrintOutcome::Canceled);
            self.pause_requested = false;
            self.home_sub_state = Some(UiSubState::PrintCanceled);
        }
        let target = self.door_resume;
        self.transition(target, ctx);
    }

    /// Start over from Initializing, or wait in DoorOpen until the door closes
    fn reinitialize(&mut self, ctx: &mut dyn PrinterActions) {
        if self.door_open {
            tracing::info!("Reset with the door open, waiting for it to close");
            self.door_resume = S::Initializing;
            self.door_clears_print = false;
            self.transition(S::DoorOpen, ctx);
        } else {
            self.transition(S::Initializing, ctx);
        }
    }

    fn fatal(&mut self, ctx: &mut dyn PrinterActions) {
        if self.state == S::Error {
            ctx.apply_pending_error();
            ctx.broadcast(S::Error, StateChange::NoChange);
            return;
        }
        self.door_clears_print = false;
        self.transition(S::Error, ctx);
    }
}
