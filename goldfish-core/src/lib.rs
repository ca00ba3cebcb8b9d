//! Goldfish Core: DSP primitives for the quiz soundtrack engine.
//!
//! Features
//! - `fast-math`: polynomial sine for the oscillator hot path
//!
//! Modules
//! - [`dsp`]       : math helpers, clock/frame conversion
//! - [`envelopes`] : time-scheduled parameter automation (`ParamTimeline`)
//! - [`filters`]   : TPT state-variable filter
//! - [`noise`]     : white and rumble noise buffer generators
//!
//! Design
//! - Per-sample primitives are `Copy` and allocation free
//! - Automation and noise buffers are built on the control side, ahead of playback

pub mod dsp;
pub mod envelopes;
pub mod filters;
pub mod noise;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{fast_sin, frame_to_time, kill_denormals, time_to_frame, wrap_phase01, TAU};
    pub use crate::envelopes::{ParamEvent, ParamTimeline, SILENCE_FLOOR};
    pub use crate::filters::{SvfMode, SvfTpt, Q_BUTTERWORTH};
    pub use crate::noise::{rumble_noise, white_noise, RUMBLE_LEAK, RUMBLE_MAKEUP};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let mut p = ParamTimeline::new(0.0);
        p.set_value_at_time(1.0, 0.0);
        assert_eq!(p.value_at(0.5), 1.0);
        let mut lp = SvfTpt::new(SvfMode::Lowpass, 1000.0, Q_BUTTERWORTH, 48000.0);
        let _ = lp.process(0.1);
    }
}
