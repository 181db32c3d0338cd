use super::{Filter, FilterUpdate};
use crate::{clock::Clock, port::Measurement, time::Duration};

/// `2^-10`, the servo's frequency-ratio rejection bound.
const FREQUENCY_BOUND: f64 = 0.0009765625;

/// Number of samples the frequency ratio is smoothed over.
const SMOOTHING_WINDOW: f64 = 8.0;

#[derive(Debug, Clone, Copy)]
pub struct ServoConfig {
    /// Phase offset magnitude above which the clock is stepped directly
    /// instead of corrected through the frequency adjustment
    /// step 4). Typically 1 ms.
    pub step_threshold: Duration,
    /// Whether the servo is allowed to touch the clock at all (CLI `-S`).
    /// When false the offset/ratio are still tracked so the IPC export
    /// stays meaningful, but `step_clock`/`set_frequency` are never
    /// called — syntonization has to be explicitly requested.
    pub enabled: bool,
}

impl Default for ServoConfig {
    fn default() -> Self {
        ServoConfig {
            step_threshold: Duration::from_millis(1),
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct PrevSample {
    event_time: crate::time::Time,
    master_offset: Duration,
}

/// The clock servo: phase offset, smoothed and
/// bounded frequency ratio, commanded rate adjustment, and a phase step for
/// offsets too large for the rate correction to absorb in reasonable time.
#[derive(Debug)]
pub struct Servo {
    config: ServoConfig,
    last: Option<PrevSample>,
    smoothed_ratio: f64,
    mean_delay: Option<Duration>,
}

impl Filter for Servo {
    type Config = ServoConfig;

    fn new(config: Self::Config) -> Self {
        Servo {
            config,
            last: None,
            smoothed_ratio: 1.0,
            mean_delay: None,
        }
    }

    fn measurement<C: Clock>(&mut self, m: Measurement, clock: &mut C) -> FilterUpdate {
        self.mean_delay = m.mean_delay;

        // Step 4: phase step for offsets the rate correction cannot absorb
        // quickly enough.
        if m.master_offset.abs() > self.config.step_threshold {
            log::debug!(
                "phase offset {} exceeds step threshold, stepping clock",
                m.master_offset
            );
            if self.config.enabled {
                if let Err(e) = clock.step_clock(m.master_offset) {
                    log::warn!("clock step failed: {:?}", e);
                }
            }
            self.restart_syntonization();
            return FilterUpdate {
                next_update: None,
                mean_delay: self.mean_delay,
            };
        }

        // Steps 2-3: smoothed, bounded frequency ratio and the rate
        // adjustment derived from it.
        if let Some(last) = self.last {
            let interval_local = m.event_time - last.event_time;
            let interval_master =
                (m.event_time - m.master_offset) - (last.event_time - last.master_offset);

            if interval_local.nanos() != 0 {
                let ratio = interval_master.nanos() as f64 / interval_local.nanos() as f64;

                if libm::fabs(ratio - 1.0) > FREQUENCY_BOUND {
                    log::warn!("rejecting out-of-bound frequency ratio sample {}", ratio);
                } else {
                    self.smoothed_ratio += (ratio - self.smoothed_ratio) / SMOOTHING_WINDOW;
                    self.smoothed_ratio = self
                        .smoothed_ratio
                        .clamp(1.0 - FREQUENCY_BOUND, 1.0 + FREQUENCY_BOUND);

                    // The clock trait's set_frequency takes parts-per-million;
                    // setFrequencyAdjustment is parts-per-billion.
                    let ppb = (self.smoothed_ratio - 1.0) * 1.0e9;
                    if self.config.enabled {
                        if let Err(e) = clock.set_frequency(ppb / 1_000.0) {
                            log::warn!("clock frequency adjustment failed: {:?}", e);
                        }
                    }
                }
            }
        }

        self.last = Some(PrevSample {
            event_time: m.event_time,
            master_offset: m.master_offset,
        });

        FilterUpdate {
            next_update: None,
            mean_delay: self.mean_delay,
        }
    }

    fn update<C: Clock>(&mut self, _clock: &mut C) -> FilterUpdate {
        FilterUpdate {
            next_update: None,
            mean_delay: self.mean_delay,
        }
    }

    fn restart_syntonization(&mut self) {
        self.last = None;
        self.smoothed_ratio = 1.0;
    }

    fn current_offset(&self) -> Option<Duration> {
        self.last.map(|s| s.master_offset)
    }

    fn frequency_ratio(&self) -> f64 {
        self.smoothed_ratio
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Time;

    #[derive(Debug)]
    struct TestClock {
        stepped: Option<Duration>,
        freq_ppm: Option<f64>,
    }

    impl Clock for TestClock {
        type Error = core::convert::Infallible;

        fn now(&self) -> Time {
            Time::default()
        }

        fn step_clock(&mut self, offset: Duration) -> Result<Time, Self::Error> {
            self.stepped = Some(offset);
            Ok(Time::default())
        }

        fn set_frequency(&mut self, ppm: f64) -> Result<Time, Self::Error> {
            self.freq_ppm = Some(ppm);
            Ok(Time::default())
        }

        fn set_properties(
            &mut self,
            _properties: &crate::clock::ClockProperties,
        ) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    fn measurement(event_time_nanos: u64, master_offset_nanos: i128) -> Measurement {
        Measurement {
            event_time: Time::from_fixed_nanos(event_time_nanos as i128),
            master_offset: Duration::from_nanos(master_offset_nanos),
            mean_delay: None,
        }
    }

    #[test]
    fn large_offset_steps_the_clock() {
        let mut servo = Servo::new(ServoConfig::default());
        let mut clock = TestClock {
            stepped: None,
            freq_ppm: None,
        };
        servo.measurement(measurement(0, 2_000_000), &mut clock);
        assert_eq!(clock.stepped, Some(Duration::from_nanos(2_000_000)));
    }

    #[test]
    fn small_offset_only_adjusts_frequency() {
        let mut servo = Servo::new(ServoConfig::default());
        let mut clock = TestClock {
            stepped: None,
            freq_ppm: None,
        };
        servo.measurement(measurement(0, 100), &mut clock);
        servo.measurement(measurement(125_000_000, 150), &mut clock);
        assert_eq!(clock.stepped, None);
    }

    #[test]
    fn disabled_servo_tracks_but_never_touches_the_clock() {
        let mut servo = Servo::new(ServoConfig {
            enabled: false,
            ..ServoConfig::default()
        });
        let mut clock = TestClock {
            stepped: None,
            freq_ppm: None,
        };
        servo.measurement(measurement(0, 2_000_000), &mut clock);
        assert_eq!(clock.stepped, None);
        assert_eq!(clock.freq_ppm, None);
    }

    #[test]
    fn restart_syntonization_clears_history() {
        let mut servo = Servo::new(ServoConfig::default());
        let mut clock = TestClock {
            stepped: None,
            freq_ppm: None,
        };
        servo.measurement(measurement(0, 100), &mut clock);
        servo.restart_syntonization();
        assert!(servo.last.is_none());
        assert_eq!(servo.smoothed_ratio, 1.0);
    }
}
