//! Generator zone resolution.
//!
//! A [`Generator`] is built by applying generator lists in four stages:
//!
//! ```text
//!   fresh Generator
//!     └─ instrument global zone   (replace)
//!         └─ instrument zone      (replace)
//!             └─ preset zone      (add, remembers what it touched)
//!                 └─ preset global zone (add, only where the preset zone did not)
//! ```
//!
//! Ranges (key/velocity) only ever narrow. The seven "value" generators are
//! clamped after every stage, except for two sentinels: `-32768` on
//! delay/attack/hold means "instantaneous" and `1000` on sustain means "fully
//! attenuated". Once every stage has run, [`Generator::finalize`] converts
//! timecents and centibels into sample frames and linear levels for the
//! zone's sample.

use log::trace;

use super::riff::{GeneratorRecord, SampleHeader};
use crate::io::converter::midi_to_freq;

pub const GEN_INITIAL_FILTER_FC: u16 = 8;
pub const GEN_PAN: u16 = 17;
pub const GEN_DELAY_VOL_ENV: u16 = 33;
pub const GEN_ATTACK_VOL_ENV: u16 = 34;
pub const GEN_HOLD_VOL_ENV: u16 = 35;
pub const GEN_DECAY_VOL_ENV: u16 = 36;
pub const GEN_SUSTAIN_VOL_ENV: u16 = 37;
pub const GEN_RELEASE_VOL_ENV: u16 = 38;
pub const GEN_INSTRUMENT: u16 = 41;
pub const GEN_KEY_RANGE: u16 = 43;
pub const GEN_VEL_RANGE: u16 = 44;
pub const GEN_COARSE_TUNE: u16 = 51;
pub const GEN_FINE_TUNE: u16 = 52;
pub const GEN_SAMPLE_ID: u16 = 53;
pub const GEN_SAMPLE_MODES: u16 = 54;
pub const GEN_EXCLUSIVE_CLASS: u16 = 57;
pub const GEN_OVERRIDING_ROOT_KEY: u16 = 58;

const TIMECENT_INSTANT: i32 = -32768;
const SUSTAIN_SILENT: i32 = 1000;
const LOWPASS_BYPASS_HZ: f32 = 20_000.0;

const GENERATOR_NAMES: [&str; 61] = [
    "startAddrsOffset",
    "endAddrsOffset",
    "startloopAddrsOffset",
    "endloopAddrsOffset",
    "startAddrsCoarseOffset",
    "modLfoToPitch",
    "vibLfoToPitch",
    "modEnvToPitch",
    "initialFilterFc",
    "initialFilterQ",
    "modLfoToFilterFc",
    "modEnvToFilterFc",
    "endAddrsCoarseOffset",
    "modLfoToVolume",
    "unused1",
    "chorusEffectsSend",
    "reverbEffectsSend",
    "pan",
    "unused2",
    "unused3",
    "unused4",
    "delayModLFO",
    "freqModLFO",
    "delayVibLFO",
    "freqVibLFO",
    "delayModEnv",
    "attackModEnv",
    "holdModEnv",
    "decayModEnv",
    "sustainModEnv",
    "releaseModEnv",
    "keynumToModEnvHold",
    "keynumToModEnvDecay",
    "delayVolEnv",
    "attackVolEnv",
    "holdVolEnv",
    "decayVolEnv",
    "sustainVolEnv",
    "releaseVolEnv",
    "keynumToVolEnvHold",
    "keynumToVolEnvDecay",
    "instrument",
    "reserved1",
    "keyRange",
    "velRange",
    "startloopAddrsCoarseOffset",
    "keynum",
    "velocity",
    "initialAttenuation",
    "reserved2",
    "endloopAddrsCoarseOffset",
    "coarseTune",
    "fineTune",
    "sampleID",
    "sampleModes",
    "reserved3",
    "scaleTuning",
    "exclusiveClass",
    "overridingRootKey",
    "unused5",
    "endOper",
];

/// Human-readable SF2 name of generator `oper`.
pub fn generator_name(oper: u16) -> &'static str {
    GENERATOR_NAMES
        .get(oper as usize)
        .copied()
        .unwrap_or("unknown")
}

/// Which zone a generator list comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyStage {
    InstrumentGlobal,
    Instrument,
    Preset,
    PresetGlobal,
}

impl ApplyStage {
    fn index(self) -> usize {
        self as usize
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    #[default]
    NoLoop,
    LoopForever,
    LoopWhileOn,
}

/// The clamped, summable generators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueGen {
    FilterFc,
    DelayVolEnv,
    AttackVolEnv,
    HoldVolEnv,
    DecayVolEnv,
    SustainVolEnv,
    ReleaseVolEnv,
}

impl ValueGen {
    pub const ALL: [ValueGen; 7] = [
        ValueGen::FilterFc,
        ValueGen::DelayVolEnv,
        ValueGen::AttackVolEnv,
        ValueGen::HoldVolEnv,
        ValueGen::DecayVolEnv,
        ValueGen::SustainVolEnv,
        ValueGen::ReleaseVolEnv,
    ];

    pub fn from_oper(oper: u16) -> Option<Self> {
        match oper {
            GEN_INITIAL_FILTER_FC => Some(ValueGen::FilterFc),
            GEN_DELAY_VOL_ENV => Some(ValueGen::DelayVolEnv),
            GEN_ATTACK_VOL_ENV => Some(ValueGen::AttackVolEnv),
            GEN_HOLD_VOL_ENV => Some(ValueGen::HoldVolEnv),
            GEN_DECAY_VOL_ENV => Some(ValueGen::DecayVolEnv),
            GEN_SUSTAIN_VOL_ENV => Some(ValueGen::SustainVolEnv),
            GEN_RELEASE_VOL_ENV => Some(ValueGen::ReleaseVolEnv),
            _ => None,
        }
    }

    /// `(min, max, default)`
    pub fn limits(self) -> (i32, i32, i32) {
        match self {
            ValueGen::FilterFc => (1500, 13500, 13500),
            ValueGen::DelayVolEnv => (-12000, 5000, -12000),
            ValueGen::AttackVolEnv => (-12000, 8000, -12000),
            ValueGen::HoldVolEnv => (-12000, 5000, -12000),
            ValueGen::DecayVolEnv => (-12000, 8000, -12000),
            ValueGen::SustainVolEnv => (0, 1440, 0),
            ValueGen::ReleaseVolEnv => (-12000, 8000, -12000),
        }
    }

    fn sentinel(self) -> Option<i32> {
        match self {
            ValueGen::DelayVolEnv | ValueGen::AttackVolEnv | ValueGen::HoldVolEnv => {
                Some(TIMECENT_INSTANT)
            }
            ValueGen::SustainVolEnv => Some(SUSTAIN_SILENT),
            _ => None,
        }
    }

    fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

/// Raw (cent/centibel) values of the value generators plus, per stage, which
/// ones that stage touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueGenerators {
    values: [i32; 7],
    touched: [u8; 4],
}

impl Default for ValueGenerators {
    fn default() -> Self {
        let mut values = [0; 7];
        for gen in ValueGen::ALL {
            values[gen as usize] = gen.limits().2;
        }
        Self {
            values,
            touched: [0; 4],
        }
    }
}

impl ValueGenerators {
    pub fn get(&self, gen: ValueGen) -> i32 {
        self.values[gen as usize]
    }

    pub fn touched(&self, gen: ValueGen, stage: ApplyStage) -> bool {
        self.touched[stage.index()] & gen.bit() != 0
    }

    pub fn apply(&mut self, gen: ValueGen, amount: i16, stage: ApplyStage) {
        // a local preset zone shadows the preset global zone
        let shadowed = self.touched(gen, ApplyStage::Preset);
        let slot = &mut self.values[gen as usize];
        let amount = amount as i32;
        match stage {
            ApplyStage::InstrumentGlobal | ApplyStage::Instrument => *slot = amount,
            ApplyStage::Preset => *slot += amount,
            ApplyStage::PresetGlobal if shadowed => return,
            ApplyStage::PresetGlobal => *slot += amount,
        }
        self.touched[stage.index()] |= gen.bit();
    }

    /// Clamp every value into its documented range. Sentinels are left alone.
    pub fn clamp(&mut self) {
        for gen in ValueGen::ALL {
            let value = &mut self.values[gen as usize];
            if gen.sentinel() == Some(*value) {
                continue;
            }
            let (min, max, _) = gen.limits();
            *value = (*value).clamp(min, max);
        }
    }
}

/// Volume envelope timings in frames of the zone's own sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EnvelopeParams {
    pub delay: f32,
    pub attack: f32,
    pub hold: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// Sample bounds copied out of the sample header, relative to the sample pool.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SampleRegion {
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
}

/// One resolved zone of a patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Generator {
    pub key_range: (u8, u8),
    pub vel_range: (u8, u8),
    pub root_key: Option<u8>,
    pub pan: f32,
    pub loop_mode: LoopMode,
    pub exclusive_class: u16,
    pub coarse_tune: i32,
    pub fine_tune: i32,
    pub sample_id: Option<usize>,
    pub values: ValueGenerators,

    // filled by `finalize`
    pub envelope: EnvelopeParams,
    pub lowpass_fc: Option<f32>,
    pub region: SampleRegion,
}

impl Default for Generator {
    fn default() -> Self {
        Self {
            key_range: (0, 127),
            vel_range: (0, 127),
            root_key: None,
            pan: 0.5,
            loop_mode: LoopMode::NoLoop,
            exclusive_class: 0,
            coarse_tune: 0,
            fine_tune: 0,
            sample_id: None,
            values: ValueGenerators::default(),
            envelope: EnvelopeParams::default(),
            lowpass_fc: None,
            region: SampleRegion::default(),
        }
    }
}

impl Generator {
    pub fn matches(&self, key: u8, velocity: u8) -> bool {
        (self.key_range.0..=self.key_range.1).contains(&key)
            && (self.vel_range.0..=self.vel_range.1).contains(&velocity)
    }

    /// Apply one zone's generator list, then clamp.
    pub fn apply_list(&mut self, gens: &[GeneratorRecord], stage: ApplyStage) {
        for gen in gens {
            self.apply(gen, stage);
        }
        self.values.clamp();
    }

    fn apply(&mut self, gen: &GeneratorRecord, stage: ApplyStage) {
        if let Some(value_gen) = ValueGen::from_oper(gen.oper) {
            self.values.apply(value_gen, gen.amount.as_i16(), stage);
            return;
        }

        match gen.oper {
            GEN_PAN => self.pan = 0.5 + gen.amount.as_i16() as f32 / 1000.0,
            GEN_KEY_RANGE => self.key_range = narrow(self.key_range, gen.amount.range()),
            GEN_VEL_RANGE => self.vel_range = narrow(self.vel_range, gen.amount.range()),
            GEN_COARSE_TUNE => self.coarse_tune += gen.amount.as_i16() as i32,
            GEN_FINE_TUNE => self.fine_tune += gen.amount.as_i16() as i32,
            GEN_SAMPLE_ID => self.sample_id = Some(gen.amount.as_u16() as usize),
            GEN_SAMPLE_MODES => match gen.amount.as_u16() {
                0 => self.loop_mode = LoopMode::NoLoop,
                1 => self.loop_mode = LoopMode::LoopForever,
                2 | 3 => self.loop_mode = LoopMode::LoopWhileOn,
                _ => {}
            },
            GEN_EXCLUSIVE_CLASS => {
                if gen.amount.as_i16() != 0 {
                    self.exclusive_class = gen.amount.as_u16();
                }
            }
            GEN_OVERRIDING_ROOT_KEY => {
                let key = gen.amount.as_i16();
                self.root_key = (0..=127).contains(&key).then_some(key as u8);
            }
            oper => trace!("unhandled generator {} ({})", generator_name(oper), oper),
        }
    }

    /// Convert the accumulated cent values into runtime parameters for `sample`.
    pub fn finalize(&mut self, sample: &SampleHeader) {
        let sr = sample.sample_rate.max(1) as f32;
        let v = &self.values;

        let timecents = |value: i32| sr * 2f32.powf(value as f32 / 1200.0);
        let instant_or = |value: i32| {
            if value == TIMECENT_INSTANT {
                0.0
            } else {
                timecents(value)
            }
        };

        let mut env = EnvelopeParams {
            delay: instant_or(v.get(ValueGen::DelayVolEnv)),
            attack: instant_or(v.get(ValueGen::AttackVolEnv)),
            hold: instant_or(v.get(ValueGen::HoldVolEnv)),
            decay: timecents(v.get(ValueGen::DecayVolEnv)),
            sustain: 1.0,
            release: timecents(v.get(ValueGen::ReleaseVolEnv)),
        };

        let centibels = v.get(ValueGen::SustainVolEnv);
        if centibels == 0 {
            env.sustain = 1.0;
            env.decay = 0.0;
        } else if centibels == SUSTAIN_SILENT {
            env.sustain = 0.0;
            env.decay = 0.0;
        } else if centibels > SUSTAIN_SILENT {
            env.sustain = 0.0;
        } else {
            env.sustain = 10f32.powf(-(centibels as f32) / 200.0);
        }
        self.envelope = env;

        let fc = midi_to_freq(v.get(ValueGen::FilterFc) as f32 * 0.01);
        self.lowpass_fc = (fc < LOWPASS_BYPASS_HZ).then_some(fc);

        self.region = SampleRegion {
            start: sample.start,
            end: sample.end,
            loop_start: sample.loop_start,
            loop_end: sample.loop_end,
            sample_rate: sample.sample_rate,
            original_pitch: sample.original_pitch,
        };
    }

    /// Root key used for pitch computation.
    pub fn effective_root_key(&self) -> u8 {
        self.root_key.unwrap_or(self.region.original_pitch)
    }
}

fn narrow(current: (u8, u8), incoming: (u8, u8)) -> (u8, u8) {
    (current.0.max(incoming.0), current.1.min(incoming.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(rate: u32) -> SampleHeader {
        SampleHeader {
            name: "s".into(),
            start: 0,
            end: 1000,
            loop_start: 100,
            loop_end: 900,
            sample_rate: rate,
            original_pitch: 60,
            pitch_correction: 0,
            sample_link: 0,
            sample_type: 1,
        }
    }

    #[test]
    fn instrument_stages_replace() {
        let mut gen = Generator::default();
        gen.apply_list(&[GeneratorRecord::new(GEN_ATTACK_VOL_ENV, -1200)], ApplyStage::InstrumentGlobal);
        gen.apply_list(&[GeneratorRecord::new(GEN_ATTACK_VOL_ENV, 0)], ApplyStage::Instrument);
        assert_eq!(gen.values.get(ValueGen::AttackVolEnv), 0);
    }

    #[test]
    fn preset_adds_and_shadows_preset_global() {
        let mut gen = Generator::default();
        gen.apply_list(&[GeneratorRecord::new(GEN_RELEASE_VOL_ENV, -1200)], ApplyStage::Instrument);
        gen.apply_list(&[GeneratorRecord::new(GEN_RELEASE_VOL_ENV, 1200)], ApplyStage::Preset);
        gen.apply_list(
            &[
                GeneratorRecord::new(GEN_RELEASE_VOL_ENV, 600),
                GeneratorRecord::new(GEN_DECAY_VOL_ENV, 600),
            ],
            ApplyStage::PresetGlobal,
        );
        assert_eq!(gen.values.get(ValueGen::ReleaseVolEnv), 0);
        // decay was not touched by the local preset zone, so the global adds
        assert_eq!(gen.values.get(ValueGen::DecayVolEnv), -12000 + 600);
    }

    #[test]
    fn preset_global_only_adds_untouched_values() {
        let mut values = ValueGenerators::default();
        values.apply(ValueGen::SustainVolEnv, 100, ApplyStage::Instrument);
        values.apply(ValueGen::SustainVolEnv, 50, ApplyStage::Preset);
        values.apply(ValueGen::SustainVolEnv, 400, ApplyStage::PresetGlobal);
        values.apply(ValueGen::HoldVolEnv, 300, ApplyStage::PresetGlobal);
        assert_eq!(values.get(ValueGen::SustainVolEnv), 150);
        assert_eq!(values.get(ValueGen::HoldVolEnv), -12000 + 300);
        assert!(values.touched(ValueGen::HoldVolEnv, ApplyStage::PresetGlobal));
        assert!(!values.touched(ValueGen::SustainVolEnv, ApplyStage::PresetGlobal));
    }

    #[test]
    fn clamp_is_idempotent_and_keeps_sentinels() {
        let mut values = ValueGenerators::default();
        values.apply(ValueGen::AttackVolEnv, 20000, ApplyStage::Instrument);
        values.apply(ValueGen::DelayVolEnv, -32768, ApplyStage::Instrument);
        values.apply(ValueGen::FilterFc, 100, ApplyStage::Instrument);
        values.clamp();
        let once = values;
        values.clamp();
        assert_eq!(once, values);
        assert_eq!(values.get(ValueGen::AttackVolEnv), 8000);
        assert_eq!(values.get(ValueGen::DelayVolEnv), -32768);
        assert_eq!(values.get(ValueGen::FilterFc), 1500);
    }

    #[test]
    fn ranges_only_narrow() {
        let mut gen = Generator::default();
        gen.apply_list(&[GeneratorRecord::range(GEN_KEY_RANGE, 40, 80)], ApplyStage::Instrument);
        gen.apply_list(&[GeneratorRecord::range(GEN_KEY_RANGE, 0, 60)], ApplyStage::Preset);
        assert_eq!(gen.key_range, (40, 60));
        assert!(gen.matches(50, 100));
        assert!(!gen.matches(61, 100));
    }

    #[test]
    fn silent_sustain_forces_zero_decay() {
        let mut gen = Generator::default();
        gen.apply_list(
            &[
                GeneratorRecord::new(GEN_DECAY_VOL_ENV, 0),
                GeneratorRecord::new(GEN_SUSTAIN_VOL_ENV, 1000),
            ],
            ApplyStage::Instrument,
        );
        gen.finalize(&sample(44_100));
        assert_eq!(gen.envelope.sustain, 0.0);
        assert_eq!(gen.envelope.decay, 0.0);
    }

    #[test]
    fn timecents_convert_to_frames() {
        let mut gen = Generator::default();
        gen.apply_list(
            &[
                GeneratorRecord::new(GEN_ATTACK_VOL_ENV, 0),
                GeneratorRecord::new(GEN_HOLD_VOL_ENV, -32768),
                GeneratorRecord::new(GEN_SUSTAIN_VOL_ENV, 200),
            ],
            ApplyStage::Instrument,
        );
        gen.finalize(&sample(22_050));
        assert!((gen.envelope.attack - 22_050.0).abs() < 0.5);
        assert_eq!(gen.envelope.hold, 0.0);
        assert!((gen.envelope.sustain - 0.1).abs() < 1e-4);
    }

    #[test]
    fn default_cutoff_enables_lowpass_just_below_bypass() {
        let mut gen = Generator::default();
        gen.finalize(&sample(44_100));
        let fc = gen.lowpass_fc.expect("13500 cents is below 20 kHz");
        assert!(fc > 19_000.0 && fc < 20_000.0);
    }

    #[test]
    fn pan_and_tuning_accumulate() {
        let mut gen = Generator::default();
        gen.apply_list(
            &[
                GeneratorRecord::new(GEN_PAN, -500),
                GeneratorRecord::new(GEN_COARSE_TUNE, 12),
                GeneratorRecord::new(GEN_EXCLUSIVE_CLASS, 0),
            ],
            ApplyStage::Instrument,
        );
        gen.apply_list(&[GeneratorRecord::new(GEN_COARSE_TUNE, -2)], ApplyStage::Preset);
        assert_eq!(gen.pan, 0.0);
        assert_eq!(gen.coarse_tune, 10);
        assert_eq!(gen.exclusive_class, 0);
    }

    #[test]
    fn names_cover_every_operator() {
        assert_eq!(generator_name(0), "startAddrsOffset");
        assert_eq!(generator_name(53), "sampleID");
        assert_eq!(generator_name(60), "endOper");
        assert_eq!(generator_name(99), "unknown");
    }
}
