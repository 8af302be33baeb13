use serde::Serialize;

/// Milliseconds on the deck clock.
pub type Millis = u64;

pub const EXIT_MS: Millis = 400;
pub const ENTER_MS: Millis = 500;
/// Horizontal offset, in percent of the viewport, of an off-screen slide.
pub const OFFSCREEN_X: f64 = 100.0;
pub const SHRUNK_SCALE: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Offset the exiting slide leaves towards.
    fn exit_x(self) -> f64 {
        match self {
            Direction::Forward => -OFFSCREEN_X,
            Direction::Backward => OFFSCREEN_X,
        }
    }

    /// Offset the entering slide comes in from.
    fn enter_x(self) -> f64 {
        -self.exit_x()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Ease {
    Power2In,
    Power2Out,
    SineInOut,
    BackOut,
}

impl Ease {
    /// Map linear progress `t` in `[0, 1]` to eased progress.
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Power2In => t * t * t,
            Ease::Power2Out => 1.0 - (1.0 - t).powi(3),
            Ease::SineInOut => -((std::f64::consts::PI * t).cos() - 1.0) / 2.0,
            Ease::BackOut => {
                let c1 = 1.70158;
                let c3 = c1 + 1.0;
                1.0 + c3 * (t - 1.0).powi(3) + c1 * (t - 1.0).powi(2)
            }
        }
    }
}

/// Position, opacity and scale of one slide.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Transform {
    pub x: f64,
    pub opacity: f64,
    pub scale: f64,
}

impl Transform {
    pub const NEUTRAL: Transform = Transform {
        x: 0.0,
        opacity: 1.0,
        scale: 1.0,
    };

    pub fn lerp(self, to: Transform, t: f64) -> Transform {
        Transform {
            x: lerp(self.x, to.x, t),
            opacity: lerp(self.opacity, to.opacity, t),
            scale: lerp(self.scale, to.scale, t),
        }
    }
}

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Progress of a `duration`-long animation started at `start`, in `[0, 1]`.
fn progress(start: Millis, duration: Millis, now: Millis) -> f64 {
    if duration == 0 {
        return 1.0;
    }
    let elapsed = now.saturating_sub(start).min(duration);
    elapsed as f64 / duration as f64
}

/// One timed interpolation of a whole slide transform.
#[derive(Debug, Clone, Copy)]
pub struct Tween {
    pub from: Transform,
    pub to: Transform,
    pub start: Millis,
    pub duration: Millis,
    pub ease: Ease,
}

impl Tween {
    pub fn end(&self) -> Millis {
        self.start + self.duration
    }

    pub fn is_finished(&self, now: Millis) -> bool {
        now >= self.end()
    }

    pub fn sample(&self, now: Millis) -> Transform {
        let t = self.ease.apply(progress(self.start, self.duration, now));
        self.from.lerp(self.to, t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Exit,
    Enter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionEvent {
    /// The exiting slide is gone and the entering slide starts moving in.
    ExitFinished { entering: usize },
    /// The entering slide reached neutral; the transition is over.
    Completed { entering: usize },
}

#[derive(Debug, Clone, Copy)]
struct Transition {
    direction: Direction,
    exiting: usize,
    entering: usize,
    stage: Stage,
    exit: Tween,
    enter: Tween,
}

/// Where a slide is drawn right now.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SlideTransform {
    pub slide: usize,
    pub transform: Transform,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TransitionFrame {
    pub direction: Direction,
    pub stage: Stage,
    pub exiting: Option<SlideTransform>,
    pub entering: Option<SlideTransform>,
}

/// Runs at most one exit-then-enter transition at a time.
#[derive(Debug, Default)]
pub struct TransitionAnimator {
    current: Option<Transition>,
}

impl TransitionAnimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the exit of `exiting`. `entering` is placed and animated once
    /// the exit finishes. Returns false if a transition is already running.
    pub fn run_transition(
        &mut self,
        direction: Direction,
        exiting: usize,
        entering: usize,
        now: Millis,
    ) -> bool {
        if self.current.is_some() {
            return false;
        }

        let exit = Tween {
            from: Transform::NEUTRAL,
            to: Transform {
                x: direction.exit_x(),
                opacity: 0.0,
                scale: SHRUNK_SCALE,
            },
            start: now,
            duration: EXIT_MS,
            ease: Ease::Power2In,
        };
        let enter = Tween {
            from: Transform {
                x: direction.enter_x(),
                opacity: 0.0,
                scale: SHRUNK_SCALE,
            },
            to: Transform::NEUTRAL,
            start: exit.end(),
            duration: ENTER_MS,
            ease: Ease::Power2Out,
        };

        self.current = Some(Transition {
            direction,
            exiting,
            entering,
            stage: Stage::Exit,
            exit,
            enter,
        });
        true
    }

    /// Move the running transition forward to `now`.
    ///
    /// Both events may be returned at once when the clock jumped past the
    /// whole sequence; they always come in order.
    pub fn advance(&mut self, now: Millis) -> Vec<TransitionEvent> {
        let mut events = Vec::new();
        let Some(transition) = self.current.as_mut() else {
            return events;
        };

        if transition.stage == Stage::Exit && transition.exit.is_finished(now) {
            transition.stage = Stage::Enter;
            events.push(TransitionEvent::ExitFinished {
                entering: transition.entering,
            });
        }

        if transition.stage == Stage::Enter && transition.enter.is_finished(now) {
            events.push(TransitionEvent::Completed {
                entering: transition.entering,
            });
            self.current = None;
        }

        events
    }

    pub fn frame(&self, now: Millis) -> Option<TransitionFrame> {
        let transition = self.current.as_ref()?;
        let (exiting, entering) = match transition.stage {
            Stage::Exit => (
                Some(SlideTransform {
                    slide: transition.exiting,
                    transform: transition.exit.sample(now),
                }),
                None,
            ),
            Stage::Enter => (
                None,
                Some(SlideTransform {
                    slide: transition.entering,
                    transform: transition.enter.sample(now),
                }),
            ),
        };

        Some(TransitionFrame {
            direction: transition.direction,
            stage: transition.stage,
            exiting,
            entering,
        })
    }
}

/// Scalar properties a slide decoration can animate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    Y,
    Opacity,
    Scale,
    Rotation,
    Glow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Repeat {
    Once,
    /// Repeat forever, reversing direction on every cycle.
    Yoyo,
}

/// Declared by a slide renderer; played by an `AnimationScope`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnimationSpec {
    pub target: String,
    pub property: Property,
    pub from: f64,
    pub to: f64,
    pub delay: Millis,
    pub duration: Millis,
    pub ease: Ease,
    pub repeat: Repeat,
}

impl AnimationSpec {
    pub fn once(
        target: &str,
        property: Property,
        from: f64,
        to: f64,
        duration: Millis,
        ease: Ease,
    ) -> Self {
        Self {
            target: target.to_string(),
            property,
            from,
            to,
            delay: 0,
            duration,
            ease,
            repeat: Repeat::Once,
        }
    }

    pub fn looping(target: &str, property: Property, from: f64, to: f64, period: Millis) -> Self {
        Self {
            target: target.to_string(),
            property,
            from,
            to,
            delay: 0,
            duration: period,
            ease: Ease::SineInOut,
            repeat: Repeat::Yoyo,
        }
    }

    pub fn delayed(mut self, delay: Millis) -> Self {
        self.delay = delay;
        self
    }

    pub fn is_looping(&self) -> bool {
        self.repeat == Repeat::Yoyo
    }

    fn sample(&self, started: Millis, now: Millis) -> f64 {
        let start = started + self.delay;
        let t = match self.repeat {
            Repeat::Once => progress(start, self.duration, now),
            Repeat::Yoyo => {
                if self.duration == 0 {
                    1.0
                } else {
                    let elapsed = now.saturating_sub(start);
                    let cycle = elapsed / self.duration;
                    let within = (elapsed % self.duration) as f64 / self.duration as f64;
                    if cycle % 2 == 0 {
                        within
                    } else {
                        1.0 - within
                    }
                }
            }
        };
        lerp(self.from, self.to, self.ease.apply(t))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnimatedValue {
    pub target: String,
    pub property: Property,
    pub value: f64,
}

/// Animations owned by the one active slide.
///
/// Dropping the scope releases every animation it started, looping ones
/// included, so a deactivated slide cannot keep anything running.
#[derive(Debug)]
pub struct AnimationScope {
    slide: usize,
    started: Millis,
    animations: Vec<AnimationSpec>,
}

impl AnimationScope {
    pub fn start(slide: usize, animations: Vec<AnimationSpec>, now: Millis) -> Self {
        Self {
            slide,
            started: now,
            animations,
        }
    }

    pub fn slide(&self) -> usize {
        self.slide
    }

    /// Number of animations that never finish on their own.
    pub fn looping_count(&self) -> usize {
        self.animations.iter().filter(|a| a.is_looping()).count()
    }

    /// Entrance animations still in flight plus every loop.
    pub fn running_count(&self, now: Millis) -> usize {
        self.animations
            .iter()
            .filter(|a| a.is_looping() || now < self.started + a.delay + a.duration)
            .count()
    }

    pub fn sample(&self, now: Millis) -> Vec<AnimatedValue> {
        self.animations
            .iter()
            .map(|a| AnimatedValue {
                target: a.target.clone(),
                property: a.property,
                value: a.sample(self.started, now),
            })
            .collect()
    }

    /// Stop everything and report how many animations were released.
    pub fn release(self) -> usize {
        self.animations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_ease_endpoints() {
        for ease in [
            Ease::Power2In,
            Ease::Power2Out,
            Ease::SineInOut,
            Ease::BackOut,
        ] {
            assert!(approx(ease.apply(0.0), 0.0), "{ease:?}");
            assert!(approx(ease.apply(1.0), 1.0), "{ease:?}");
        }
        assert!(Ease::BackOut.apply(0.7) > 1.0);
    }

    #[test]
    fn test_forward_transition_sequence() {
        let mut animator = TransitionAnimator::new();
        assert!(animator.run_transition(Direction::Forward, 0, 1, 1000));

        let frame = animator.frame(1000).unwrap();
        assert_eq!(frame.stage, Stage::Exit);
        assert_eq!(frame.exiting.unwrap().transform, Transform::NEUTRAL);
        assert!(frame.entering.is_none());

        assert!(animator.advance(1399).is_empty());
        let frame = animator.frame(1399).unwrap();
        assert!(frame.exiting.unwrap().transform.x < 0.0);

        assert_eq!(
            animator.advance(1400),
            vec![TransitionEvent::ExitFinished { entering: 1 }]
        );
        let entering = animator.frame(1400).unwrap().entering.unwrap();
        assert_eq!(entering.slide, 1);
        assert_eq!(
            entering.transform,
            Transform {
                x: OFFSCREEN_X,
                opacity: 0.0,
                scale: SHRUNK_SCALE
            }
        );

        assert!(animator.advance(1899).is_empty());
        assert!(animator.frame(1899).is_some());
        assert_eq!(
            animator.advance(1900),
            vec![TransitionEvent::Completed { entering: 1 }]
        );
        assert!(animator.frame(1900).is_none());
    }

    #[test]
    fn test_backward_mirrors_sides() {
        let mut animator = TransitionAnimator::new();
        animator.run_transition(Direction::Backward, 3, 2, 0);

        let exiting = animator.frame(EXIT_MS - 1).unwrap().exiting.unwrap();
        assert!(exiting.transform.x > 0.0);

        animator.advance(EXIT_MS);
        let entering = animator.frame(EXIT_MS).unwrap().entering.unwrap();
        assert_eq!(entering.transform.x, -OFFSCREEN_X);
    }

    #[test]
    fn test_clock_jump_emits_both_events_in_order() {
        let mut animator = TransitionAnimator::new();
        animator.run_transition(Direction::Forward, 0, 5, 0);

        let events = animator.advance(10_000);
        assert_eq!(
            events,
            vec![
                TransitionEvent::ExitFinished { entering: 5 },
                TransitionEvent::Completed { entering: 5 },
            ]
        );
    }

    #[test]
    fn test_second_transition_refused_while_running() {
        let mut animator = TransitionAnimator::new();
        assert!(animator.run_transition(Direction::Forward, 0, 1, 0));
        assert!(!animator.run_transition(Direction::Forward, 1, 2, 10));
    }

    #[test]
    fn test_yoyo_loop_reverses() {
        let spec = AnimationSpec::looping("icon", Property::Scale, 1.0, 2.0, 1000);

        assert!(approx(spec.sample(0, 0), 1.0));
        assert!(approx(spec.sample(0, 1000), 2.0));
        assert!(approx(spec.sample(0, 2000), 1.0));
        assert!(approx(spec.sample(0, 500), 1.5));
        assert!(approx(spec.sample(0, 1500), 1.5));
    }

    #[test]
    fn test_scope_counts_and_release() {
        let scope = AnimationScope::start(
            2,
            vec![
                AnimationSpec::once("title", Property::Y, 50.0, 0.0, 600, Ease::Power2Out),
                AnimationSpec::looping("icon", Property::Glow, 0.0, 1.0, 2000),
            ],
            100,
        );

        assert_eq!(scope.slide(), 2);
        assert_eq!(scope.looping_count(), 1);
        assert_eq!(scope.running_count(100), 2);
        assert_eq!(scope.running_count(700), 1);
        assert_eq!(scope.sample(700)[0].value, 0.0);
        assert_eq!(scope.release(), 2);
    }
}
