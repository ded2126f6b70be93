// src/automation.rs
//
// Automation timelines for a single rendered parameter.
//
// The envelope keeps its own record of everything it has scheduled so the
// value at any moment can be answered by pure evaluation. Each edit is also
// mirrored to the rendered parameter as an `AutomationOp`.

use crate::clock::Time;

/// Number of time constants a decay curve spans before it is pinned to its
/// target. e^-5 leaves less than 1% of the starting distance.
pub const CURVE_TIME_CONSTANTS: f64 = 5.0;

// ═══════════════════════════════════════════════════════════════════
// Rendered parameter
// ═══════════════════════════════════════════════════════════════════

/// One instruction for a parameter in the rendering graph.
///
/// Mirrors the automation vocabulary of Web Audio `AudioParam`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AutomationOp {
    /// Drop every event scheduled at or after `from`.
    CancelScheduledValues { from: Time },
    /// Drop events at or after `time`, holding the value the parameter has there.
    CancelAndHoldAtTime { time: Time },
    /// Write the value immediately.
    SetValue { value: f64 },
    SetValueAtTime { value: f64, time: Time },
    LinearRampToValueAtTime { value: f64, time: Time },
    SetTargetAtTime {
        target: f64,
        start: Time,
        time_constant: Time,
    },
}

/// A parameter living in the rendering graph.
///
/// Parameters are written into, never read back.
pub trait AutomatableParam {
    fn apply(&mut self, op: AutomationOp);
}

/// A parameter that is not connected to anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedParam;

impl AutomatableParam for DetachedParam {
    #[inline]
    fn apply(&mut self, _op: AutomationOp) {}
}

// ═══════════════════════════════════════════════════════════════════
// Timeline segments
// ═══════════════════════════════════════════════════════════════════

/// One scheduled segment of an envelope's timeline.
///
/// A segment governs the parameter from its start until the next
/// segment starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    /// Step to `value`.
    Jump { time: Time, value: f64 },
    /// Straight line from `from` to `to`, then hold `to`.
    Line {
        start: Time,
        end: Time,
        from: f64,
        to: f64,
    },
    /// Exponential approach from `from` toward `to`, pinned to `to` at `end`.
    Curve {
        start: Time,
        end: Time,
        from: f64,
        to: f64,
    },
    /// Freeze at `value`. Nothing is scheduled beyond this point.
    Hold { time: Time, value: f64 },
}

impl Automation {
    /// The moment this segment takes over.
    #[inline]
    pub fn start(&self) -> Time {
        match *self {
            Automation::Jump { time, .. } | Automation::Hold { time, .. } => time,
            Automation::Line { start, .. } | Automation::Curve { start, .. } => start,
        }
    }

    /// Evaluate the segment at `t`, which must not precede its start.
    fn value_at(&self, t: Time) -> f64 {
        match *self {
            Automation::Jump { value, .. } | Automation::Hold { value, .. } => value,

            Automation::Line {
                start,
                end,
                from,
                to,
            } => {
                if t >= end || end <= start {
                    to
                } else {
                    from + (to - from) * (t - start) / (end - start)
                }
            }

            Automation::Curve {
                start,
                end,
                from,
                to,
            } => {
                if t >= end || end <= start {
                    to
                } else {
                    let time_constant = (end - start) / CURVE_TIME_CONSTANTS;
                    to + (from - to) * (-(t - start) / time_constant).exp()
                }
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// Envelope
// ═══════════════════════════════════════════════════════════════════

/// Timeline of scheduled changes for one parameter.
///
/// Segments are kept in strictly increasing start order: every edit first
/// cancels everything at or after its own start time.
pub struct AutomationEnvelope {
    param: Box<dyn AutomatableParam>,
    /// Value before the first segment.
    initial: f64,
    segments: Vec<Automation>,
}

impl AutomationEnvelope {
    pub fn new(param: Box<dyn AutomatableParam>, initial: f64) -> Self {
        Self {
            param,
            initial,
            segments: Vec::new(),
        }
    }

    /// An envelope that only keeps its own record.
    pub fn detached(initial: f64) -> Self {
        Self::new(Box::new(DetachedParam), initial)
    }

    /// Step to `value` at `t`.
    pub fn jump_at(&mut self, t: Time, value: f64) {
        self.cancel_from(t);
        self.segments.push(Automation::Jump { time: t, value });
        self.param
            .apply(AutomationOp::SetValueAtTime { value, time: t });
    }

    /// Move linearly from the value at `t0` to `value`, arriving at `t1`.
    pub fn line(&mut self, t0: Time, t1: Time, value: f64) {
        let from = self.value_at(t0);
        self.cancel_from(t0);
        self.segments.push(Automation::Line {
            start: t0,
            end: t1.max(t0),
            from,
            to: value,
        });
        self.param.apply(AutomationOp::SetValueAtTime {
            value: from,
            time: t0,
        });
        self.param.apply(AutomationOp::LinearRampToValueAtTime {
            value,
            time: t1.max(t0),
        });
    }

    /// Decay from the value at `t0` toward `value`, settling on it at `t1`.
    pub fn curve(&mut self, t0: Time, t1: Time, value: f64) {
        let from = self.value_at(t0);
        let end = t1.max(t0);
        self.cancel_from(t0);
        self.segments.push(Automation::Curve {
            start: t0,
            end,
            from,
            to: value,
        });
        self.param.apply(AutomationOp::SetValueAtTime {
            value: from,
            time: t0,
        });
        if end > t0 {
            self.param.apply(AutomationOp::SetTargetAtTime {
                target: value,
                start: t0,
                time_constant: (end - t0) / CURVE_TIME_CONSTANTS,
            });
        }
        self.param
            .apply(AutomationOp::SetValueAtTime { value, time: end });
    }

    /// Cancel everything at or after `t`, freezing the value held at `t`.
    pub fn truncate_at(&mut self, t: Time) {
        let value = self.value_at(t);
        self.drop_from(t);
        self.segments.push(Automation::Hold { time: t, value });
        self.param
            .apply(AutomationOp::CancelAndHoldAtTime { time: t });
    }

    /// Drop the whole timeline and write `value` immediately.
    pub fn reset(&mut self, value: f64) {
        self.segments.clear();
        self.initial = value;
        self.param
            .apply(AutomationOp::CancelScheduledValues { from: 0.0 });
        self.param.apply(AutomationOp::SetValue { value });
    }

    /// The value the timeline prescribes at `t`.
    pub fn value_at(&self, t: Time) -> f64 {
        let governing = self.segments.partition_point(|s| s.start() <= t);
        match governing.checked_sub(1) {
            Some(index) => self.segments[index].value_at(t),
            None => self.initial,
        }
    }

    /// The scheduled segments, earliest first.
    pub fn automations(&self) -> &[Automation] {
        &self.segments
    }

    /// Remove segments starting at or after `t`, and mirror the cut.
    ///
    /// A rendered linear ramp is keyed by its end time, so cancelling from
    /// inside one would drop the whole ramp. Hold it at `t` instead.
    fn cancel_from(&mut self, t: Time) {
        self.drop_from(t);
        let op = if self.ramp_spans(t) {
            AutomationOp::CancelAndHoldAtTime { time: t }
        } else {
            AutomationOp::CancelScheduledValues { from: t }
        };
        self.param.apply(op);
    }

    fn drop_from(&mut self, t: Time) {
        let keep = self.segments.partition_point(|s| s.start() < t);
        self.segments.truncate(keep);
    }

    /// Whether the last segment is a line still running at `t`.
    fn ramp_spans(&self, t: Time) -> bool {
        matches!(self.segments.last(), Some(Automation::Line { end, .. }) if *end > t)
    }
}

impl std::fmt::Debug for AutomationEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomationEnvelope")
            .field("initial", &self.initial)
            .field("segments", &self.segments)
            .finish()
    }
}
