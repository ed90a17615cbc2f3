//! SF2 SoundFont banks.
//!
//! A bank is parsed once from its RIFF container (`INFO`, `sdta`, `pdta`)
//! into raw tables, then every preset is resolved into a [`Patch`] holding
//! ready-to-play [`Generator`] zones. The result is immutable and shared
//! between devices behind an `Arc`.

pub mod builder;
pub mod generator;
pub mod patch;
pub mod riff;

use std::path::Path;

use log::{debug, warn};

use crate::error::SoundFontError;

pub use builder::SoundFontBuilder;
pub use generator::{ApplyStage, EnvelopeParams, Generator, LoopMode, SampleRegion};
pub use patch::Patch;
pub use riff::{GenAmount, GeneratorRecord, RawTables, SampleHeader};

use generator::{GEN_INSTRUMENT, GEN_SAMPLE_ID};
use riff::{fourcc, read_u32, ChunkIter};

/// Bank number of General MIDI percussion kits.
pub const DRUM_BANK: u16 = 128;

#[derive(Debug, Clone)]
pub struct SoundFont {
    name: String,
    samples: Vec<i16>,
    tables: RawTables,
    patches: Vec<Patch>,
}

impl SoundFont {
    /// Read and parse an `.sf2` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SoundFontError> {
        let bytes = std::fs::read(path.as_ref())?;
        let font = Self::from_bytes(&bytes)?;
        debug!(
            "loaded soundfont {:?} from {} ({} patches)",
            font.name,
            path.as_ref().display(),
            font.patches.len()
        );
        Ok(font)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SoundFontError> {
        if bytes.len() < 12 || &bytes[0..4] != b"RIFF" {
            return Err(SoundFontError::BadMagic {
                expected: "RIFF",
                found: String::from_utf8_lossy(&fourcc(bytes, 0)).into_owned(),
            });
        }
        let form = fourcc(bytes, 8);
        if &form != b"sfbk" {
            return Err(SoundFontError::BadMagic {
                expected: "sfbk",
                found: String::from_utf8_lossy(&form).into_owned(),
            });
        }

        let riff_len = (read_u32(bytes, 4) as usize).saturating_sub(4);
        let body = &bytes[12..(12 + riff_len).min(bytes.len())];

        let mut name = String::new();
        let mut samples = None;
        let mut tables = None;

        for chunk in ChunkIter::new(body) {
            let Some((kind, children)) = chunk.list() else {
                continue;
            };
            match &kind {
                b"INFO" => {
                    for info in children.filter(|c| &c.id == b"INAM") {
                        name = riff::read_zstr(info.data);
                    }
                }
                b"sdta" => {
                    for smpl in children.filter(|c| &c.id == b"smpl") {
                        samples = Some(
                            smpl.data
                                .chunks_exact(2)
                                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                                .collect::<Vec<_>>(),
                        );
                    }
                }
                b"pdta" => tables = Some(RawTables::parse(children)?),
                _ => {}
            }
        }

        let samples = samples.ok_or(SoundFontError::MissingChunk("smpl"))?;
        let tables = tables.ok_or(SoundFontError::MissingChunk("pdta"))?;
        let patches = build_patches(&tables);

        Ok(Self {
            name,
            samples,
            tables,
            patches,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The whole 16-bit sample pool; zone regions index into it.
    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn tables(&self) -> &RawTables {
        &self.tables
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn patch(&self, index: usize) -> Option<&Patch> {
        self.patches.get(index)
    }

    pub fn patch_index(&self, program: u16, bank: u16) -> Option<usize> {
        self.patches
            .iter()
            .position(|p| p.program == program && p.bank == bank)
    }

    pub fn find_patch(&self, program: u16, bank: u16) -> Option<&Patch> {
        self.patch_index(program, bank).and_then(|i| self.patch(i))
    }

    /// The GM percussion kit, `(0, 128)`.
    pub fn drum_kit(&self) -> Option<&Patch> {
        self.find_patch(0, DRUM_BANK)
    }
}

fn build_patches(tables: &RawTables) -> Vec<Patch> {
    (0..tables.presets.len())
        .map(|index| {
            let header = &tables.presets[index];
            let mut generators = Vec::new();
            let mut global: Option<&[GeneratorRecord]> = None;

            for (position, bag) in tables.preset_bag_range(index).enumerate() {
                let gens = tables.preset_zone(bag);
                let Some(last) = gens.last() else {
                    continue;
                };
                if last.oper != GEN_INSTRUMENT {
                    if position == 0 {
                        global = Some(gens);
                    }
                    continue;
                }

                let instrument = last.amount.as_u16() as usize;
                let own = &gens[..gens.len() - 1];
                for mut gen in instrument_generators(tables, instrument) {
                    gen.apply_list(own, ApplyStage::Preset);
                    if let Some(global) = global {
                        gen.apply_list(global, ApplyStage::PresetGlobal);
                    }
                    let Some(sample) = gen.sample_id.and_then(|id| tables.samples.get(id)) else {
                        warn!(
                            "preset {:?}: zone references missing sample {:?}",
                            header.name, gen.sample_id
                        );
                        continue;
                    };
                    gen.finalize(sample);
                    generators.push(gen);
                }
            }

            Patch {
                name: header.name.clone(),
                program: header.preset,
                bank: header.bank,
                generators,
            }
        })
        .collect()
}

/// Zones of one instrument with its global zone already applied.
fn instrument_generators(tables: &RawTables, instrument: usize) -> Vec<Generator> {
    if instrument >= tables.instruments.len() {
        warn!("preset references missing instrument {}", instrument);
        return Vec::new();
    }

    let mut zones = Vec::new();
    let mut global: Option<&[GeneratorRecord]> = None;
    for (position, bag) in tables.instrument_bag_range(instrument).enumerate() {
        let gens = tables.instrument_zone(bag);
        let is_sample_zone = gens.last().is_some_and(|g| g.oper == GEN_SAMPLE_ID);
        if !is_sample_zone {
            if position == 0 {
                global = Some(gens);
            }
            continue;
        }

        let mut gen = Generator::default();
        if let Some(global) = global {
            gen.apply_list(global, ApplyStage::InstrumentGlobal);
        }
        gen.apply_list(gens, ApplyStage::Instrument);
        if gen.sample_id.is_some() {
            zones.push(gen);
        }
    }
    zones
}
