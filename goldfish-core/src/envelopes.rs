//! Time-scheduled parameter automation.
//!
//! A [`ParamTimeline`] is a sorted list of automation events evaluated against
//! an absolute clock (seconds, `f64`). It is how every gain envelope and pitch
//! sweep in the engine is expressed: events are written ahead of time by the
//! scheduler and read back sample by sample on the render side.
//!
//! Event semantics:
//! - `SetValue`        : jump to `value` at `time`
//! - `LinearRamp`      : straight line from the previous event to `value` at `time`
//! - `ExponentialRamp` : geometric curve from the previous event to `value` at `time`;
//!                       if either end is zero or the signs differ the previous
//!                       value is held until `time`, then jumps
//! - `SetTarget`       : from `time` on, approach `target` with time constant `tau`
//!
//! A ramp always starts at the time of the event before it (or at 0.0 when it is
//! the first event), from whatever value the timeline had there.

use core::fmt::Debug;

/// Lowest value an exponential decay is taken down to before a voice stops.
pub const SILENCE_FLOOR: f32 = 0.001;

/// A single automation event.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ParamEvent {
    SetValue { value: f32, time: f64 },
    LinearRamp { value: f32, time: f64 },
    ExponentialRamp { value: f32, time: f64 },
    SetTarget { target: f32, time: f64, tau: f64 },
}

impl ParamEvent {
    #[inline]
    pub fn time(&self) -> f64 {
        match *self {
            ParamEvent::SetValue { time, .. }
            | ParamEvent::LinearRamp { time, .. }
            | ParamEvent::ExponentialRamp { time, .. }
            | ParamEvent::SetTarget { time, .. } => time,
        }
    }
}

/// The curve the timeline is on after the most recent event.
#[derive(Copy, Clone, Debug)]
enum Segment {
    Hold(f32),
    Target { v0: f32, t0: f64, target: f32, tau: f64 },
}

impl Segment {
    #[inline]
    fn at(&self, t: f64) -> f32 {
        match *self {
            Segment::Hold(v) => v,
            Segment::Target { v0, t0, target, tau } => {
                if tau <= 0.0 {
                    target
                } else {
                    let k = (-(t - t0).max(0.0) / tau).exp() as f32;
                    target + (v0 - target) * k
                }
            }
        }
    }
}

/// Automation timeline for one parameter (gain, frequency, ...).
#[derive(Clone, Debug)]
pub struct ParamTimeline {
    default: f32,
    events: Vec<ParamEvent>,
}

impl ParamTimeline {
    /// Timeline that holds `default` until the first event.
    pub fn new(default: f32) -> Self {
        Self { default, events: Vec::new() }
    }

    /// Events in time order.
    pub fn events(&self) -> &[ParamEvent] {
        &self.events
    }

    /// Time of the last scheduled event, if any.
    pub fn last_event_time(&self) -> Option<f64> {
        self.events.last().map(ParamEvent::time)
    }

    fn insert(&mut self, ev: ParamEvent) -> &mut Self {
        // Events at equal times keep insertion order.
        let at = self.events.partition_point(|e| e.time() <= ev.time());
        self.events.insert(at, ev);
        self
    }

    pub fn set_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(ParamEvent::SetValue { value, time })
    }

    pub fn linear_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(ParamEvent::LinearRamp { value, time })
    }

    pub fn exponential_ramp_to_value_at_time(&mut self, value: f32, time: f64) -> &mut Self {
        self.insert(ParamEvent::ExponentialRamp { value, time })
    }

    pub fn set_target_at_time(&mut self, target: f32, time: f64, tau: f64) -> &mut Self {
        self.insert(ParamEvent::SetTarget { target, time, tau })
    }

    /// Freeze the curve at its value at `time` and drop every event.
    ///
    /// History before `time` is forgotten; callers only use this with the
    /// current clock time, which never moves backwards.
    pub fn cancel_and_hold_at_time(&mut self, time: f64) -> &mut Self {
        let v = self.value_at(time);
        self.events.clear();
        self.events.push(ParamEvent::SetValue { value: v, time });
        self
    }

    /// Percussive shape used by every pitched voice: silent at `start`,
    /// linear rise to `peak` over `attack`, exponential fall to `floor` at `end`.
    pub fn percussive(&mut self, start: f64, peak: f32, attack: f64, floor: f32, end: f64) -> &mut Self {
        self.set_value_at_time(0.0, start)
            .linear_ramp_to_value_at_time(peak, start + attack)
            .exponential_ramp_to_value_at_time(floor, end)
    }

    /// Evaluate the timeline at absolute time `t`.
    pub fn value_at(&self, t: f64) -> f32 {
        let mut seg = Segment::Hold(self.default);
        let mut prev_t = 0.0_f64;

        for ev in &self.events {
            match *ev {
                ParamEvent::SetValue { value, time } => {
                    if t < time {
                        return seg.at(t);
                    }
                    seg = Segment::Hold(value);
                }
                ParamEvent::LinearRamp { value, time } => {
                    let v0 = seg.at(prev_t);
                    if t < time {
                        let span = time - prev_t;
                        if span <= 0.0 {
                            return v0;
                        }
                        let x = ((t - prev_t) / span).clamp(0.0, 1.0) as f32;
                        return v0 + (value - v0) * x;
                    }
                    seg = Segment::Hold(value);
                }
                ParamEvent::ExponentialRamp { value, time } => {
                    let v0 = seg.at(prev_t);
                    if t < time {
                        let span = time - prev_t;
                        if span <= 0.0 || v0 * value <= 0.0 {
                            return v0;
                        }
                        let x = ((t - prev_t) / span).clamp(0.0, 1.0);
                        let ratio = f64::from(value / v0);
                        return (f64::from(v0) * ratio.powf(x)) as f32;
                    }
                    seg = Segment::Hold(value);
                }
                ParamEvent::SetTarget { target, time, tau } => {
                    if t < time {
                        return seg.at(t);
                    }
                    let v0 = seg.at(time);
                    seg = Segment::Target { v0, t0: time, target, tau };
                }
            }
            prev_t = ev.time();
        }
        seg.at(t)
    }
}

// ------------------------------------ Tests --------------------------------------
