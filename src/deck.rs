use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::animation::{
    AnimatedValue, AnimationScope, Direction, Ease, Millis, TransitionAnimator, TransitionEvent,
    TransitionFrame,
};
use crate::models::StatisticsRecord;
use crate::slides::{RenderedSlide, SlideRegistry};

pub const PROGRESS_MS: Millis = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum DeckPhase {
    Idle {
        index: usize,
    },
    Transitioning {
        from: usize,
        to: usize,
        direction: Direction,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "camelCase")]
pub enum Rejection {
    InTransition,
    AtFirstSlide,
    AtLastSlide,
    SameSlide,
    OutOfRange { index: usize, count: usize },
    UnboundInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum NavOutcome {
    Started {
        from: usize,
        to: usize,
        direction: Direction,
    },
    Rejected {
        #[serde(flatten)]
        rejection: Rejection,
    },
}

impl NavOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, NavOutcome::Started { .. })
    }
}

/// Raw input from the presentation layer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputEvent {
    /// Keyboard key name: `ArrowRight` or space advance, `ArrowLeft` goes back.
    Key { key: String },
    /// Click at horizontal position `x` on a surface `width` wide.
    Pointer { x: f64, width: f64 },
    /// Click on the dot of slide `index`.
    Indicator { index: usize },
}

/// Animated progress bar fraction.
#[derive(Debug, Clone, Copy)]
struct ProgressIndicator {
    from: f64,
    to: f64,
    start: Millis,
}

impl ProgressIndicator {
    fn value(&self, now: Millis) -> f64 {
        let elapsed = now.saturating_sub(self.start).min(PROGRESS_MS);
        let t = Ease::Power2Out.apply(elapsed as f64 / PROGRESS_MS as f64);
        self.from + (self.to - self.from) * t
    }

    fn retarget(&mut self, to: f64, now: Millis) {
        self.from = self.value(now);
        self.to = to;
        self.start = now;
    }
}

/// Snapshot of the state a deck owns.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckState<'a> {
    pub current_index: usize,
    pub transition_in_progress: bool,
    pub record: &'a StatisticsRecord,
}

/// Everything a presentation layer needs to draw the deck at one instant.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeckView {
    pub index: usize,
    pub count: usize,
    pub phase: DeckPhase,
    pub progress: f64,
    pub slide: Option<RenderedSlide>,
    pub frame: Option<TransitionFrame>,
    pub animations: Vec<AnimatedValue>,
    /// Slide owning the running animations; `None` mid-transition.
    pub active_slide: Option<usize>,
    pub looping_animations: usize,
    pub running_animations: usize,
}

/// Two states, `Idle(index)` and `Transitioning(from, to, direction)`.
/// Every operation first lets the animator report what finished by `now`,
/// so a request arriving after the enter animation ended is accepted.
pub struct DeckController {
    record: StatisticsRecord,
    registry: SlideRegistry,
    phase: DeckPhase,
    animator: TransitionAnimator,
    scope: Option<AnimationScope>,
    progress: ProgressIndicator,
}

impl DeckController {
    pub fn new(record: StatisticsRecord, now: Millis) -> Self {
        Self::with_registry(record, SlideRegistry::default(), now)
    }

    fn with_registry(record: StatisticsRecord, registry: SlideRegistry, now: Millis) -> Self {
        let mut deck = Self {
            record,
            registry,
            phase: DeckPhase::Idle { index: 0 },
            animator: TransitionAnimator::new(),
            scope: None,
            progress: ProgressIndicator {
                from: 0.0,
                to: 0.0,
                start: now,
            },
        };
        deck.activate(0, now);
        deck.enter_idle(0, now);
        deck
    }

    pub fn count(&self) -> usize {
        self.registry.len()
    }

    pub fn phase(&self) -> DeckPhase {
        self.phase
    }

    /// Index of the slide being presented. Changes only when a transition
    /// completes.
    pub fn index(&self) -> usize {
        match self.phase {
            DeckPhase::Idle { index } => index,
            DeckPhase::Transitioning { from, .. } => from,
        }
    }

    pub fn is_transitioning(&self) -> bool {
        matches!(self.phase, DeckPhase::Transitioning { .. })
    }

    pub fn state(&self) -> DeckState<'_> {
        DeckState {
            current_index: self.index(),
            transition_in_progress: self.is_transitioning(),
            record: &self.record,
        }
    }

    /// Slide currently owning animations, if any.
    pub fn active_slide(&self) -> Option<usize> {
        self.scope.as_ref().map(AnimationScope::slide)
    }

    /// Looping animations attached to slide `index`.
    pub fn looping_animations(&self, index: usize) -> usize {
        match &self.scope {
            Some(scope) if scope.slide() == index => scope.looping_count(),
            _ => 0,
        }
    }

    pub fn progress(&self, now: Millis) -> f64 {
        self.progress.value(now)
    }

    /// Apply transition events that happened up to `now`.
    pub fn tick(&mut self, now: Millis) {
        for event in self.animator.advance(now) {
            match event {
                TransitionEvent::ExitFinished { entering } => self.activate(entering, now),
                TransitionEvent::Completed { entering } => self.enter_idle(entering, now),
            }
        }
    }

    pub fn go_next(&mut self, now: Millis) -> NavOutcome {
        self.tick(now);
        let DeckPhase::Idle { index } = self.phase else {
            return reject(Rejection::InTransition);
        };
        if index + 1 >= self.count() {
            return reject(Rejection::AtLastSlide);
        }
        self.start(index, index + 1, Direction::Forward, now)
    }

    pub fn go_prev(&mut self, now: Millis) -> NavOutcome {
        self.tick(now);
        let DeckPhase::Idle { index } = self.phase else {
            return reject(Rejection::InTransition);
        };
        if index == 0 {
            return reject(Rejection::AtFirstSlide);
        }
        self.start(index, index - 1, Direction::Backward, now)
    }

    pub fn jump_to(&mut self, target: usize, now: Millis) -> NavOutcome {
        self.tick(now);
        let count = self.count();
        if target >= count {
            warn!(index = target, count, "jump target out of range");
            return reject(Rejection::OutOfRange {
                index: target,
                count,
            });
        }
        let DeckPhase::Idle { index } = self.phase else {
            return reject(Rejection::InTransition);
        };
        if target == index {
            return reject(Rejection::SameSlide);
        }
        let direction = if target > index {
            Direction::Forward
        } else {
            Direction::Backward
        };
        self.start(index, target, direction, now)
    }

    /// Route keyboard and pointer input through the guarded operations.
    pub fn handle_input(&mut self, event: &InputEvent, now: Millis) -> NavOutcome {
        match event {
            InputEvent::Key { key } => match key.as_str() {
                "ArrowRight" | " " => self.go_next(now),
                "ArrowLeft" => self.go_prev(now),
                _ => reject(Rejection::UnboundInput),
            },
            InputEvent::Pointer { x, width } => {
                if !(*width > 0.0) {
                    return reject(Rejection::UnboundInput);
                }
                if *x > width / 2.0 {
                    self.go_next(now)
                } else {
                    self.go_prev(now)
                }
            }
            InputEvent::Indicator { index } => self.jump_to(*index, now),
        }
    }

    pub fn view(&self, now: Millis) -> DeckView {
        let active_slide = self.active_slide();
        let slide = match active_slide {
            Some(index) => self.registry.render(index, &self.record, true),
            None => self.registry.render(self.index(), &self.record, false),
        };

        DeckView {
            index: self.index(),
            count: self.count(),
            phase: self.phase(),
            progress: self.progress(now),
            slide,
            frame: self.animator.frame(now),
            animations: self
                .scope
                .as_ref()
                .map(|scope| scope.sample(now))
                .unwrap_or_default(),
            active_slide,
            looping_animations: active_slide.map_or(0, |index| self.looping_animations(index)),
            running_animations: self
                .scope
                .as_ref()
                .map_or(0, |scope| scope.running_count(now)),
        }
    }

    fn start(&mut self, from: usize, to: usize, direction: Direction, now: Millis) -> NavOutcome {
        if !self.animator.run_transition(direction, from, to, now) {
            return reject(Rejection::InTransition);
        }
        self.deactivate();
        self.phase = DeckPhase::Transitioning {
            from,
            to,
            direction,
        };
        debug!(from, to, ?direction, "transition started");
        NavOutcome::Started {
            from,
            to,
            direction,
        }
    }

    fn activate(&mut self, index: usize, now: Millis) {
        self.deactivate();
        if let Some(slide) = self.registry.render(index, &self.record, true) {
            self.scope = Some(AnimationScope::start(index, slide.animations, now));
        }
    }

    fn deactivate(&mut self) {
        if let Some(scope) = self.scope.take() {
            let slide = scope.slide();
            let released = scope.release();
            debug!(slide, released, "slide deactivated");
        }
    }

    fn enter_idle(&mut self, index: usize, now: Millis) {
        self.phase = DeckPhase::Idle { index };
        let target = (index + 1) as f64 / self.count() as f64;
        self.progress.retarget(target, now);
    }
}

fn reject(rejection: Rejection) -> NavOutcome {
    debug!(?rejection, "navigation rejected");
    NavOutcome::Rejected { rejection }
}
