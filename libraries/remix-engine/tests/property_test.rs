//! Property-based tests for the rate math and the lock coordinator
//!
//! Uses proptest to verify invariants across many random inputs.

use proptest::prelude::*;
use remix_engine::time_scale::{ratio_to_semitones, semitone_offset, semitones_to_ratio};
use remix_engine::{LockCoordinator, RateControl};

// ===== Helpers =====

fn ratio() -> impl Strategy<Value = f64> {
    0.05f64..8.0
}

fn control() -> impl Strategy<Value = RateControl> {
    prop_oneof![Just(RateControl::Speed), Just(RateControl::Pitch)]
}

#[derive(Debug, Clone)]
enum Op {
    Set(RateControl, f64),
    Reset(RateControl),
    Toggle,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (control(), ratio()).prop_map(|(c, v)| Op::Set(c, v)),
        1 => control().prop_map(Op::Reset),
        1 => Just(Op::Toggle),
    ]
}

// ===== Property Tests =====

proptest! {
    /// Property: the offset is 12 * log2(pitch / speed)
    #[test]
    fn offset_matches_formula(speed in ratio(), pitch in ratio()) {
        let expected = 12.0 * (pitch / speed).log2();
        prop_assert!((semitone_offset(speed, pitch) - expected).abs() < 1e-9);
    }

    /// Property: equal ratios need no pitch correction
    #[test]
    fn equal_ratios_give_zero_offset(value in ratio()) {
        prop_assert!(semitone_offset(value, value).abs() < 1e-12);
    }

    /// Property: any input yields a finite offset
    #[test]
    fn offset_is_always_finite(speed in any::<f64>(), pitch in any::<f64>()) {
        prop_assert!(semitone_offset(speed, pitch).is_finite());
    }

    /// Property: semitone conversion inverts
    #[test]
    fn semitones_invert(value in ratio()) {
        let back = semitones_to_ratio(ratio_to_semitones(value));
        prop_assert!((back - value).abs() < 1e-9 * value.max(1.0));
    }

    /// Property: after toggling into Locked, speed == pitch == last touched value
    #[test]
    fn locking_copies_last_touched(
        speed in ratio(),
        pitch in ratio(),
        last in control(),
    ) {
        let mut rates = LockCoordinator::new(1.0, 1.0, false);
        match last {
            RateControl::Speed => {
                rates.set_pitch(pitch).unwrap();
                rates.set_speed(speed).unwrap();
            }
            RateControl::Pitch => {
                rates.set_speed(speed).unwrap();
                rates.set_pitch(pitch).unwrap();
            }
        }
        let expected = match last {
            RateControl::Speed => speed,
            RateControl::Pitch => pitch,
        };

        let state = rates.toggle();
        prop_assert!(state.locked);
        prop_assert_eq!(state.speed, expected);
        prop_assert_eq!(state.pitch, expected);
    }

    /// Property: while locked, every operation leaves speed == pitch
    #[test]
    fn locked_ratios_stay_equal(ops in prop::collection::vec(op(), 1..40)) {
        let mut rates = LockCoordinator::new(1.0, 1.0, true);
        for op in ops {
            let state = match op {
                Op::Set(control, value) => rates.set(control, value).unwrap(),
                Op::Reset(control) => rates.reset(control),
                Op::Toggle => rates.toggle(),
            };
            if state.locked {
                prop_assert_eq!(state.speed, state.pitch);
                prop_assert!(state.semitones().abs() < 1e-12);
            }
            prop_assert!(state.speed > 0.0 && state.speed.is_finite());
            prop_assert!(state.pitch > 0.0 && state.pitch.is_finite());
        }
    }

    /// Property: unlocked, changing one control leaves the other untouched
    #[test]
    fn unlocked_controls_are_independent(
        start_speed in ratio(),
        start_pitch in ratio(),
        value in ratio(),
        which in control(),
    ) {
        let mut rates = LockCoordinator::new(start_speed, start_pitch, false);
        let state = rates.set(which, value).unwrap();
        match which {
            RateControl::Speed => {
                prop_assert_eq!(state.speed, value);
                prop_assert_eq!(state.pitch, start_pitch);
            }
            RateControl::Pitch => {
                prop_assert_eq!(state.pitch, value);
                prop_assert_eq!(state.speed, start_speed);
            }
        }
    }

    /// Property: reset returns to 1.0 and propagates only while locked
    #[test]
    fn reset_returns_to_unity(
        speed in ratio(),
        pitch in ratio(),
        locked in any::<bool>(),
        which in control(),
    ) {
        let mut rates = LockCoordinator::new(1.0, 1.0, false);
        rates.set_speed(speed).unwrap();
        rates.set_pitch(pitch).unwrap();
        rates.set_locked(locked);
        let before = rates.state();

        let state = rates.reset(which);
        prop_assert_eq!(state.value(which), 1.0);
        let other = match which {
            RateControl::Speed => RateControl::Pitch,
            RateControl::Pitch => RateControl::Speed,
        };
        if locked {
            prop_assert_eq!(state.value(other), 1.0);
        } else {
            prop_assert_eq!(state.value(other), before.value(other));
        }
    }
}
