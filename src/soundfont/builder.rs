//! Writes minimal SF2 banks in memory.
//!
//! Used to synthesize a fallback bank when no `.sf2` file is available and to
//! build fixtures. Only the chunks the parser reads are emitted; modulator
//! tables hold their terminal record only.

use super::riff::{GeneratorRecord, BAG_SIZE, GEN_SIZE, INST_SIZE, MOD_SIZE, PHDR_SIZE, SHDR_SIZE};
use crate::io::converter::midi_to_freq;

/// Zero frames every sample must be followed by.
const SAMPLE_GUARD: usize = 46;

#[derive(Debug, Clone)]
pub struct SampleSpec {
    pub name: String,
    pub data: Vec<i16>,
    pub sample_rate: u32,
    pub original_pitch: u8,
    /// Loop points relative to the sample start.
    pub loop_points: Option<(u32, u32)>,
}

impl SampleSpec {
    /// A looped sine wave at the pitch of `original_pitch`.
    pub fn sine(name: &str, sample_rate: u32, original_pitch: u8, frames: usize) -> Self {
        let freq = midi_to_freq(original_pitch as f32);
        let data = (0..frames)
            .map(|i| {
                let phase = std::f32::consts::TAU * freq * i as f32 / sample_rate as f32;
                (phase.sin() * 0.8 * i16::MAX as f32) as i16
            })
            .collect();
        Self {
            name: name.to_string(),
            data,
            sample_rate,
            original_pitch,
            loop_points: Some((0, frames as u32)),
        }
    }

    /// A short decaying noise burst, unlooped.
    pub fn click(name: &str, sample_rate: u32, original_pitch: u8, frames: usize) -> Self {
        let mut seed: u32 = 0x1234_5678;
        let data = (0..frames)
            .map(|i| {
                seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let noise = (seed >> 16) as i16 as f32 / i16::MAX as f32;
                let decay = 1.0 - i as f32 / frames as f32;
                (noise * decay * decay * 0.9 * i16::MAX as f32) as i16
            })
            .collect();
        Self {
            name: name.to_string(),
            data,
            sample_rate,
            original_pitch,
            loop_points: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentSpec {
    pub name: String,
    /// Global zone; omitted when empty.
    pub global: Vec<GeneratorRecord>,
    /// Each zone must end with a `sampleID` generator.
    pub zones: Vec<Vec<GeneratorRecord>>,
}

#[derive(Debug, Clone, Default)]
pub struct PresetSpec {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub global: Vec<GeneratorRecord>,
    /// Each zone must end with an `instrument` generator.
    pub zones: Vec<Vec<GeneratorRecord>>,
}

#[derive(Debug, Clone, Default)]
pub struct SoundFontBuilder {
    name: String,
    samples: Vec<SampleSpec>,
    instruments: Vec<InstrumentSpec>,
    presets: Vec<PresetSpec>,
}

impl SoundFontBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    /// Returns the sample id to reference from a `sampleID` generator.
    pub fn add_sample(&mut self, sample: SampleSpec) -> u16 {
        self.samples.push(sample);
        (self.samples.len() - 1) as u16
    }

    /// Returns the index to reference from an `instrument` generator.
    pub fn add_instrument(&mut self, instrument: InstrumentSpec) -> u16 {
        self.instruments.push(instrument);
        (self.instruments.len() - 1) as u16
    }

    pub fn add_preset(&mut self, preset: PresetSpec) {
        self.presets.push(preset);
    }

    pub fn build(&self) -> Vec<u8> {
        let mut info = chunk(b"ifil", &[2, 0, 1, 0]);
        info.extend(chunk(b"INAM", &zstr(&self.name)));

        let (smpl, shdr) = self.sample_tables();
        let sdta = chunk(b"smpl", &smpl);

        let (phdr, pbag, pgen) = self.preset_tables();
        let (inst, ibag, igen) = self.instrument_tables();

        let mut pdta = Vec::new();
        pdta.extend(chunk(b"phdr", &phdr));
        pdta.extend(chunk(b"pbag", &pbag));
        pdta.extend(chunk(b"pmod", &[0u8; MOD_SIZE]));
        pdta.extend(chunk(b"pgen", &pgen));
        pdta.extend(chunk(b"inst", &inst));
        pdta.extend(chunk(b"ibag", &ibag));
        pdta.extend(chunk(b"imod", &[0u8; MOD_SIZE]));
        pdta.extend(chunk(b"igen", &igen));
        pdta.extend(chunk(b"shdr", &shdr));

        let mut body = b"sfbk".to_vec();
        body.extend(list(b"INFO", &info));
        body.extend(list(b"sdta", &sdta));
        body.extend(list(b"pdta", &pdta));
        chunk(b"RIFF", &body)
    }

    fn sample_tables(&self) -> (Vec<u8>, Vec<u8>) {
        let mut smpl = Vec::new();
        let mut shdr = Vec::with_capacity((self.samples.len() + 1) * SHDR_SIZE);
        let mut offset = 0u32;
        for sample in &self.samples {
            for frame in &sample.data {
                smpl.extend_from_slice(&frame.to_le_bytes());
            }
            smpl.extend(std::iter::repeat(0u8).take(SAMPLE_GUARD * 2));

            let len = sample.data.len() as u32;
            let (loop_start, loop_end) = sample.loop_points.unwrap_or((0, len));
            shdr.extend(name20(&sample.name));
            for value in [offset, offset + len, offset + loop_start, offset + loop_end, sample.sample_rate] {
                shdr.extend_from_slice(&value.to_le_bytes());
            }
            shdr.push(sample.original_pitch);
            shdr.push(0);
            shdr.extend_from_slice(&0u16.to_le_bytes());
            shdr.extend_from_slice(&1u16.to_le_bytes());

            offset += len + SAMPLE_GUARD as u32;
        }
        shdr.extend(name20("EOS"));
        shdr.extend(std::iter::repeat(0u8).take(SHDR_SIZE - 20));
        (smpl, shdr)
    }

    fn preset_tables(&self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let mut phdr = Vec::with_capacity((self.presets.len() + 1) * PHDR_SIZE);
        let mut bags = ZoneWriter::default();
        for preset in &self.presets {
            phdr.extend(name20(&preset.name));
            phdr.extend_from_slice(&preset.program.to_le_bytes());
            phdr.extend_from_slice(&preset.bank.to_le_bytes());
            phdr.extend_from_slice(&bags.bag_count().to_le_bytes());
            phdr.extend_from_slice(&[0u8; 12]);
            bags.push_zones(&preset.global, &preset.zones);
        }
        phdr.extend(name20("EOP"));
        phdr.extend_from_slice(&[0u8; 4]);
        phdr.extend_from_slice(&bags.bag_count().to_le_bytes());
        phdr.extend_from_slice(&[0u8; 12]);
        let (bag, gen) = bags.finish();
        (phdr, bag, gen)
    }

    fn instrument_tables(&self) -> (Vec<u8>, Vec<u8>, Vec<u8>) {
        let mut inst = Vec::with_capacity((self.instruments.len() + 1) * INST_SIZE);
        let mut bags = ZoneWriter::default();
        for instrument in &self.instruments {
            inst.extend(name20(&instrument.name));
            inst.extend_from_slice(&bags.bag_count().to_le_bytes());
            bags.push_zones(&instrument.global, &instrument.zones);
        }
        inst.extend(name20("EOI"));
        inst.extend_from_slice(&bags.bag_count().to_le_bytes());
        let (bag, gen) = bags.finish();
        (inst, bag, gen)
    }
}

/// Accumulates bag and generator records for one side (presets or instruments).
#[derive(Default)]
struct ZoneWriter {
    bags: Vec<u8>,
    gens: Vec<u8>,
    gen_count: u16,
}

impl ZoneWriter {
    fn bag_count(&self) -> u16 {
        (self.bags.len() / BAG_SIZE) as u16
    }

    fn push_zones(&mut self, global: &[GeneratorRecord], zones: &[Vec<GeneratorRecord>]) {
        if !global.is_empty() {
            self.push_zone(global);
        }
        for zone in zones {
            self.push_zone(zone);
        }
    }

    fn push_zone(&mut self, gens: &[GeneratorRecord]) {
        self.bags.extend_from_slice(&self.gen_count.to_le_bytes());
        self.bags.extend_from_slice(&0u16.to_le_bytes());
        for gen in gens {
            self.gens.extend_from_slice(&gen.oper.to_le_bytes());
            self.gens.extend_from_slice(&gen.amount.0.to_le_bytes());
            self.gen_count += 1;
        }
    }

    fn finish(mut self) -> (Vec<u8>, Vec<u8>) {
        self.bags.extend_from_slice(&self.gen_count.to_le_bytes());
        self.bags.extend_from_slice(&0u16.to_le_bytes());
        self.gens.extend_from_slice(&[0u8; GEN_SIZE]);
        (self.bags, self.gens)
    }
}

fn chunk(id: &[u8; 4], data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + data.len() + 1);
    out.extend_from_slice(id);
    out.extend_from_slice(&(data.len() as u32).to_le_bytes());
    out.extend_from_slice(data);
    if data.len() % 2 == 1 {
        out.push(0);
    }
    out
}

fn list(kind: &[u8; 4], children: &[u8]) -> Vec<u8> {
    let mut data = kind.to_vec();
    data.extend_from_slice(children);
    chunk(b"LIST", &data)
}

fn name20(name: &str) -> [u8; 20] {
    let mut out = [0u8; 20];
    for (dst, src) in out.iter_mut().zip(name.bytes().take(19)) {
        *dst = src;
    }
    out
}

fn zstr(text: &str) -> Vec<u8> {
    let mut out = text.as_bytes().to_vec();
    out.push(0);
    if out.len() % 2 == 1 {
        out.push(0);
    }
    out
}
