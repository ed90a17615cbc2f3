use crate::soundfont::EnvelopeParams;

/*
DAHDSR Volume Envelope
======================

Every SoundFont zone carries a six-stage volume envelope. Stage lengths are
resolved once per zone (see `Generator::finalize`) and arrive here already
converted to frames of the zone's *sample* rate, so the envelope clock is
advanced by the same step the sample read head uses when the sample and
output rates differ.

Vocabulary
----------

  time        Frames elapsed inside the current phase. Advanced by `step`
              once per output sample.

  duration    Length of the current phase in frames. A zero-length phase is
              skipped within the same sample.

  gate        Whether the key is still held. Dropping the gate moves any
              sounding phase straight to Release.

  release     Level captured the moment the gate dropped. Release always
              ramps from there to silence, never from the sustain level.


The Shape
---------

  Level
    1.0 ┐        ┌──┐
        │       ╱    ╲
    S   │      ╱      ╲________
        │     ╱                ╲
    0.0 └────╱──────────────────╲──→ Time
        Delay Attack Hold Decay Sustain Release

Attack ramps 0 → 1, Hold stays at 1, Decay ramps 1 → S, Release ramps the
captured level → 0. All ramps are linear in amplitude.


The State Machine
-----------------

    Initial → Delay → Attack → Hold → Decay → Sustain → Release → Final
                        │        │       │
                        └────────┴───────┴──── gate low ────→ Release

Phases fall through: if a phase has already run its course when it is
entered, the next phase is evaluated for the same sample. Overflow time is
carried into the next phase (`time -= duration`) so phase boundaries do not
drift with the step size.

Two shortcuts:

  - A sustain level below 0.001 ends the note at the Sustain boundary. This
    is how "sustain = 1000 cB" zones (fully attenuated) finish: decay is
    forced to zero upstream, so the note goes silent after Hold.

  - Releasing before Attack has finished starts the release ramp from the
    partially-attacked level, so short notes never jump to full volume.
*/

/// Phase of the volume envelope, in the order they are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopePhase {
    Initial,
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Final,
}

#[derive(Debug, Clone, Copy)]
pub struct VolumeEnvelope {
    params: EnvelopeParams,
    phase: EnvelopePhase,
    time: f32,
    duration: f32,
    release_level: f32,
}

const SILENT_SUSTAIN: f32 = 0.001;

impl VolumeEnvelope {
    pub fn new(params: EnvelopeParams) -> Self {
        Self {
            params,
            phase: EnvelopePhase::Initial,
            time: 0.0,
            duration: 0.0,
            release_level: 0.0,
        }
    }

    /// Level for the current sample, or `None` once the envelope has finished.
    ///
    /// Does not advance time; call [`advance`](Self::advance) afterwards.
    pub fn level(&mut self, gate: bool) -> Option<f32> {
        loop {
            match self.phase {
                EnvelopePhase::Initial => {
                    self.phase = EnvelopePhase::Delay;
                    self.time = 0.0;
                    self.duration = self.params.delay;
                }
                EnvelopePhase::Delay => {
                    if self.time < self.duration {
                        return Some(0.0);
                    }
                    self.transition(EnvelopePhase::Attack, self.params.attack);
                }
                EnvelopePhase::Attack => {
                    if self.time < self.duration {
                        let level = self.time / self.duration;
                        if !gate {
                            self.begin_release(level);
                        }
                        return Some(level);
                    }
                    self.transition(EnvelopePhase::Hold, self.params.hold);
                }
                EnvelopePhase::Hold => {
                    if self.time < self.duration {
                        if !gate {
                            self.begin_release(1.0);
                        }
                        return Some(1.0);
                    }
                    self.transition(EnvelopePhase::Decay, self.params.decay);
                }
                EnvelopePhase::Decay => {
                    if self.time < self.duration {
                        let t = self.time / self.duration;
                        let level = (1.0 - t) + t * self.params.sustain;
                        if !gate {
                            self.begin_release(level);
                        }
                        return Some(level);
                    }
                    self.transition(EnvelopePhase::Sustain, 0.0);
                }
                EnvelopePhase::Sustain => {
                    if self.params.sustain < SILENT_SUSTAIN {
                        self.phase = EnvelopePhase::Final;
                        return None;
                    }
                    if gate {
                        return Some(self.params.sustain);
                    }
                    self.release_level = self.params.sustain;
                    self.transition(EnvelopePhase::Release, self.params.release);
                }
                EnvelopePhase::Release => {
                    if self.time < self.duration {
                        let t = self.time / self.duration;
                        return Some((1.0 - t) * self.release_level);
                    }
                    self.phase = EnvelopePhase::Final;
                    return None;
                }
                EnvelopePhase::Final => return None,
            }
        }
    }

    pub fn advance(&mut self, step: f32) {
        self.time += step;
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EnvelopePhase::Final
    }

    /// Level the release ramp started from (0 until a release has begun).
    pub fn release_level(&self) -> f32 {
        self.release_level
    }

    fn transition(&mut self, phase: EnvelopePhase, duration: f32) {
        self.time -= self.duration;
        self.phase = phase;
        self.duration = duration;
    }

    fn begin_release(&mut self, from: f32) {
        self.release_level = from;
        self.phase = EnvelopePhase::Release;
        self.time = 0.0;
        self.duration = self.params.release;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(attack: f32, hold: f32, decay: f32, sustain: f32, release: f32) -> EnvelopeParams {
        EnvelopeParams {
            delay: 0.0,
            attack,
            hold,
            decay,
            sustain,
            release,
        }
    }

    fn run(env: &mut VolumeEnvelope, gate: bool, frames: usize) -> Option<f32> {
        let mut last = None;
        for _ in 0..frames {
            last = env.level(gate);
            env.advance(1.0);
        }
        last
    }

    #[test]
    fn attack_ramps_linearly() {
        let mut env = VolumeEnvelope::new(params(100.0, 0.0, 0.0, 1.0, 10.0));
        assert_eq!(env.level(true), Some(0.0));
        env.advance(50.0);
        assert_eq!(env.level(true), Some(0.5));
        assert_eq!(env.phase(), EnvelopePhase::Attack);
    }

    #[test]
    fn decays_to_sustain_and_holds() {
        let mut env = VolumeEnvelope::new(params(10.0, 10.0, 100.0, 0.25, 10.0));
        let level = run(&mut env, true, 400).unwrap();
        assert_eq!(env.phase(), EnvelopePhase::Sustain);
        assert!((level - 0.25).abs() < 1e-6);
    }

    #[test]
    fn early_release_starts_from_current_level() {
        let mut env = VolumeEnvelope::new(params(100.0, 0.0, 0.0, 1.0, 50.0));
        run(&mut env, true, 40);
        let level = env.level(false).unwrap();
        assert!((level - 0.4).abs() < 1e-6);
        assert_eq!(env.phase(), EnvelopePhase::Release);
        assert!((env.release_level() - 0.4).abs() < 1e-6);

        assert_eq!(run(&mut env, false, 60), None);
        assert!(env.is_finished());
    }

    #[test]
    fn silent_sustain_finishes_without_release() {
        let mut env = VolumeEnvelope::new(params(0.0, 20.0, 0.0, 0.0, 1000.0));
        run(&mut env, true, 20);
        assert_eq!(env.level(true), None);
        assert!(env.is_finished());
        assert_eq!(env.release_level(), 0.0);
    }

    #[test]
    fn delay_is_silent() {
        let mut env = VolumeEnvelope::new(EnvelopeParams {
            delay: 30.0,
            ..params(0.0, 100.0, 0.0, 1.0, 0.0)
        });
        assert_eq!(run(&mut env, true, 30), Some(0.0));
        assert_eq!(env.level(true), Some(1.0));
    }
}
