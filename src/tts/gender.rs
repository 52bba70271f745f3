//! Speaker gender estimation from a recording.
//!
//! [`PitchGenderClassifier`] combines two cues:
//!
//! 1. **Fundamental frequency**: autocorrelation pitch over voiced frames;
//!    a mean below 155 Hz is taken as male.
//! 2. **Spectral tilt**: for higher voices, energy below ~1 kHz is compared
//!    with the energy above it; a dominant low band (≥ 1.2×) still reads as
//!    male.
//!
//! When no frame carries a reliable pitch the classifier answers
//! [`Gender::Male`].

use crate::audio::{to_mono_at, AudioBuffer};

use super::voices::Gender;

/// Estimates the gender of the dominant speaker.
pub trait GenderClassifier: Send + Sync {
    fn classify(&self, audio: &AudioBuffer) -> Gender;
}

const ANALYSIS_RATE: u32 = 16_000;
const FRAME: usize = 640; // 40 ms
const HOP: usize = 320; // 20 ms
const MIN_F0_HZ: f32 = 60.0;
const MAX_F0_HZ: f32 = 400.0;

/// Pitch plus spectral-tilt heuristic.
#[derive(Debug, Clone)]
pub struct PitchGenderClassifier {
    /// Mean F0 below this is male.
    pub pitch_threshold_hz: f32,
    /// Low/high band energy ratio at or above which a higher voice is still
    /// classified male.
    pub tilt_ratio: f32,
    /// Crossover between the low and high band.
    pub crossover_hz: f32,
    /// Frames quieter than this RMS are unvoiced.
    pub voicing_rms: f32,
    /// Normalised autocorrelation peak needed to accept a pitch.
    pub min_periodicity: f32,
    /// Only the first `max_analysis_secs` of the recording are analysed.
    pub max_analysis_secs: f32,
}

impl Default for PitchGenderClassifier {
    fn default() -> Self {
        Self {
            pitch_threshold_hz: 155.0,
            tilt_ratio: 1.2,
            crossover_hz: 1_000.0,
            voicing_rms: 0.01,
            min_periodicity: 0.3,
            max_analysis_secs: 30.0,
        }
    }
}

impl GenderClassifier for PitchGenderClassifier {
    fn classify(&self, audio: &AudioBuffer) -> Gender {
        let mut samples = to_mono_at(audio, ANALYSIS_RATE);
        samples.truncate((self.max_analysis_secs * ANALYSIS_RATE as f32) as usize);

        let Some(f0) = self.mean_pitch(&samples) else {
            log::debug!("gender: no reliable pitch, defaulting to male");
            return Gender::Male;
        };
        if f0 < self.pitch_threshold_hz {
            log::debug!("gender: mean F0 {f0:.0} Hz → male");
            return Gender::Male;
        }

        let (low, high) = self.band_energies(&samples);
        let gender = if low >= self.tilt_ratio * high {
            Gender::Male
        } else {
            Gender::Female
        };
        log::debug!("gender: mean F0 {f0:.0} Hz, low/high {:.2} → {gender}", low / high.max(1e-12));
        gender
    }
}

impl PitchGenderClassifier {
    /// Mean F0 over voiced, periodic frames.
    pub fn mean_pitch(&self, samples: &[f32]) -> Option<f32> {
        let min_lag = (ANALYSIS_RATE as f32 / MAX_F0_HZ) as usize;
        let max_lag = (ANALYSIS_RATE as f32 / MIN_F0_HZ) as usize;
        if samples.len() < FRAME {
            return None;
        }

        let mut sum = 0.0_f32;
        let mut count = 0u32;
        let mut start = 0;
        while start + FRAME <= samples.len() {
            let frame = &samples[start..start + FRAME];
            start += HOP;

            let energy: f32 = frame.iter().map(|s| s * s).sum();
            if (energy / FRAME as f32).sqrt() < self.voicing_rms {
                continue;
            }

            let mut best_lag = 0;
            let mut best_r = 0.0_f32;
            for lag in min_lag..=max_lag.min(FRAME - 1) {
                let r: f32 = frame[..FRAME - lag]
                    .iter()
                    .zip(&frame[lag..])
                    .map(|(a, b)| a * b)
                    .sum();
                let r = r / energy;
                if r > best_r {
                    best_r = r;
                    best_lag = lag;
                }
            }
            if best_lag > 0 && best_r >= self.min_periodicity {
                sum += ANALYSIS_RATE as f32 / best_lag as f32;
                count += 1;
            }
        }

        (count > 0).then(|| sum / count as f32)
    }

    /// Energy below and above the crossover, split with a one-pole low-pass.
    fn band_energies(&self, samples: &[f32]) -> (f32, f32) {
        let dt = 1.0 / ANALYSIS_RATE as f32;
        let rc = 1.0 / (2.0 * std::f32::consts::PI * self.crossover_hz);
        let alpha = dt / (rc + dt);

        let mut lp = 0.0_f32;
        let mut low = 0.0_f32;
        let mut high = 0.0_f32;
        for &s in samples {
            lp += alpha * (s - lp);
            let hp = s - lp;
            low += lp * lp;
            high += hp * hp;
        }
        (low, high)
    }
}
