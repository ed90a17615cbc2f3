//! RIFF chunk walking and the fixed-size record tables of an SF2 `pdta` list.
//!
//! Every record is decoded verbatim, little-endian. Each table in the file ends
//! with a terminal record (`EOP`, `EOI`, `EOS`, zeroed bags/generators) which is
//! dropped once the table has been read.

use log::warn;

use crate::error::SoundFontError;

pub(crate) const PHDR_SIZE: usize = 38;
pub(crate) const BAG_SIZE: usize = 4;
pub(crate) const MOD_SIZE: usize = 10;
pub(crate) const GEN_SIZE: usize = 4;
pub(crate) const INST_SIZE: usize = 22;
pub(crate) const SHDR_SIZE: usize = 46;

/// One chunk: four-character id plus its payload.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Chunk<'a> {
    pub id: [u8; 4],
    pub data: &'a [u8],
}

impl<'a> Chunk<'a> {
    /// For `LIST` chunks: the list type and the sub-chunks it holds.
    pub fn list(&self) -> Option<([u8; 4], ChunkIter<'a>)> {
        if &self.id != b"LIST" || self.data.len() < 4 {
            return None;
        }
        let kind = fourcc(self.data, 0);
        Some((kind, ChunkIter::new(&self.data[4..])))
    }
}

/// Iterates over consecutive chunks, honouring the pad byte after odd sizes.
pub(crate) struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ChunkIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pos + 8 > self.data.len() {
            return None;
        }
        let id = fourcc(self.data, self.pos);
        let size = read_u32(self.data, self.pos + 4) as usize;
        let start = self.pos + 8;
        let end = start.saturating_add(size).min(self.data.len());
        self.pos = start.saturating_add(size).saturating_add(size & 1);
        Some(Chunk {
            id,
            data: &self.data[start..end],
        })
    }
}

pub(crate) fn fourcc(data: &[u8], offset: usize) -> [u8; 4] {
    let mut id = [0u8; 4];
    if let Some(bytes) = data.get(offset..offset + 4) {
        id.copy_from_slice(bytes);
    }
    id
}

#[inline]
pub(crate) fn read_u16(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

/// Fixed 20-byte, NUL padded name field.
pub(crate) fn read_name(data: &[u8]) -> String {
    read_zstr(&data[..data.len().min(20)])
}

/// NUL terminated (or unterminated) text.
pub(crate) fn read_zstr(raw: &[u8]) -> String {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..len]).trim_end().to_string()
}

/// The 16-bit generator amount, readable as signed, unsigned or a lo/hi byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenAmount(pub u16);

impl GenAmount {
    pub fn from_i16(value: i16) -> Self {
        Self(value as u16)
    }

    pub fn from_range(lo: u8, hi: u8) -> Self {
        Self(u16::from_le_bytes([lo, hi]))
    }

    pub fn as_i16(self) -> i16 {
        self.0 as i16
    }

    pub fn as_u16(self) -> u16 {
        self.0
    }

    pub fn range(self) -> (u8, u8) {
        let [lo, hi] = self.0.to_le_bytes();
        (lo, hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratorRecord {
    pub oper: u16,
    pub amount: GenAmount,
}

impl GeneratorRecord {
    pub fn new(oper: u16, amount: i16) -> Self {
        Self {
            oper,
            amount: GenAmount::from_i16(amount),
        }
    }

    pub fn unsigned(oper: u16, amount: u16) -> Self {
        Self {
            oper,
            amount: GenAmount(amount),
        }
    }

    pub fn range(oper: u16, lo: u8, hi: u8) -> Self {
        Self {
            oper,
            amount: GenAmount::from_range(lo, hi),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bag {
    pub gen_index: u16,
    pub mod_index: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetHeader {
    pub name: String,
    pub preset: u16,
    pub bank: u16,
    pub bag_index: u16,
    pub library: u32,
    pub genre: u32,
    pub morphology: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentHeader {
    pub name: String,
    pub bag_index: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleHeader {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub loop_start: u32,
    pub loop_end: u32,
    pub sample_rate: u32,
    pub original_pitch: u8,
    pub pitch_correction: i8,
    pub sample_link: u16,
    pub sample_type: u16,
}

/// The `pdta` tables, terminal records removed.
#[derive(Debug, Default, Clone)]
pub struct RawTables {
    pub presets: Vec<PresetHeader>,
    pub preset_bags: Vec<Bag>,
    pub preset_gens: Vec<GeneratorRecord>,
    pub instruments: Vec<InstrumentHeader>,
    pub instrument_bags: Vec<Bag>,
    pub instrument_gens: Vec<GeneratorRecord>,
    pub samples: Vec<SampleHeader>,
}

impl RawTables {
    pub(crate) fn parse(pdta: ChunkIter<'_>) -> Result<Self, SoundFontError> {
        let mut tables = RawTables::default();
        for chunk in pdta {
            match &chunk.id {
                b"phdr" => {
                    tables.presets = read_records(chunk.data, "phdr", PHDR_SIZE, |r| PresetHeader {
                        name: read_name(r),
                        preset: read_u16(r, 20),
                        bank: read_u16(r, 22),
                        bag_index: read_u16(r, 24),
                        library: read_u32(r, 26),
                        genre: read_u32(r, 30),
                        morphology: read_u32(r, 34),
                    })?
                }
                b"pbag" => tables.preset_bags = read_records(chunk.data, "pbag", BAG_SIZE, read_bag)?,
                b"pgen" => tables.preset_gens = read_records(chunk.data, "pgen", GEN_SIZE, read_gen)?,
                b"inst" => {
                    tables.instruments = read_records(chunk.data, "inst", INST_SIZE, |r| InstrumentHeader {
                        name: read_name(r),
                        bag_index: read_u16(r, 20),
                    })?
                }
                b"ibag" => tables.instrument_bags = read_records(chunk.data, "ibag", BAG_SIZE, read_bag)?,
                b"igen" => tables.instrument_gens = read_records(chunk.data, "igen", GEN_SIZE, read_gen)?,
                b"shdr" => {
                    tables.samples = read_records(chunk.data, "shdr", SHDR_SIZE, |r| SampleHeader {
                        name: read_name(r),
                        start: read_u32(r, 20),
                        end: read_u32(r, 24),
                        loop_start: read_u32(r, 28),
                        loop_end: read_u32(r, 32),
                        sample_rate: read_u32(r, 36),
                        original_pitch: r[40],
                        pitch_correction: r[41] as i8,
                        sample_link: read_u16(r, 42),
                        sample_type: read_u16(r, 44),
                    })?
                }
                // modulators are not evaluated
                b"pmod" | b"imod" => {}
                other => warn!("skipping unknown pdta chunk {:?}", String::from_utf8_lossy(other)),
            }
        }
        Ok(tables)
    }

    /// Generator slice of preset bag `bag`.
    pub fn preset_zone(&self, bag: usize) -> &[GeneratorRecord] {
        zone_slice(&self.preset_bags, &self.preset_gens, bag)
    }

    /// Generator slice of instrument bag `bag`.
    pub fn instrument_zone(&self, bag: usize) -> &[GeneratorRecord] {
        zone_slice(&self.instrument_bags, &self.instrument_gens, bag)
    }

    /// Bag indices owned by preset `index`.
    pub fn preset_bag_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = self.presets[index].bag_index as usize;
        let end = self
            .presets
            .get(index + 1)
            .map(|p| p.bag_index as usize)
            .unwrap_or(self.preset_bags.len());
        start.min(end)..end.min(self.preset_bags.len())
    }

    /// Bag indices owned by instrument `index`.
    pub fn instrument_bag_range(&self, index: usize) -> std::ops::Range<usize> {
        let start = self.instruments[index].bag_index as usize;
        let end = self
            .instruments
            .get(index + 1)
            .map(|i| i.bag_index as usize)
            .unwrap_or(self.instrument_bags.len());
        start.min(end)..end.min(self.instrument_bags.len())
    }
}

/// `[bag[i].gen_index, bag[i+1].gen_index)`, the last bag running to the end of the list.
fn zone_slice<'a>(bags: &[Bag], gens: &'a [GeneratorRecord], bag: usize) -> &'a [GeneratorRecord] {
    let Some(current) = bags.get(bag) else {
        return &[];
    };
    let start = current.gen_index as usize;
    let end = bags
        .get(bag + 1)
        .map(|b| b.gen_index as usize)
        .unwrap_or(gens.len());
    gens.get(start..end.min(gens.len())).unwrap_or(&[])
}

fn read_bag(r: &[u8]) -> Bag {
    Bag {
        gen_index: read_u16(r, 0),
        mod_index: read_u16(r, 2),
    }
}

fn read_gen(r: &[u8]) -> GeneratorRecord {
    GeneratorRecord {
        oper: read_u16(r, 0),
        amount: GenAmount(read_u16(r, 2)),
    }
}

fn read_records<T>(
    data: &[u8],
    chunk: &'static str,
    record_size: usize,
    decode: impl Fn(&[u8]) -> T,
) -> Result<Vec<T>, SoundFontError> {
    if data.len() < record_size {
        return Err(SoundFontError::Truncated {
            chunk,
            len: data.len(),
            record_size,
        });
    }
    if data.len() % record_size != 0 {
        warn!(
            "chunk `{}` has {} trailing bytes",
            chunk,
            data.len() % record_size
        );
    }
    let mut records: Vec<T> = data.chunks_exact(record_size).map(decode).collect();
    records.pop();
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_iter_skips_pad_byte() {
        let mut data = Vec::new();
        data.extend_from_slice(b"abcd");
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[1, 2, 3, 0]);
        data.extend_from_slice(b"efgh");
        data.extend_from_slice(&2u32.to_le_bytes());
        data.extend_from_slice(&[4, 5]);

        let chunks: Vec<_> = ChunkIter::new(&data).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0].id, b"abcd");
        assert_eq!(chunks[0].data, &[1, 2, 3]);
        assert_eq!(&chunks[1].id, b"efgh");
        assert_eq!(chunks[1].data, &[4, 5]);
    }

    #[test]
    fn truncated_chunk_reports_size() {
        let err = read_records(&[0u8; 10], "shdr", SHDR_SIZE, |_| ()).unwrap_err();
        assert!(matches!(err, SoundFontError::Truncated { chunk: "shdr", .. }));
    }

    #[test]
    fn terminal_record_is_dropped() {
        let data = [1u8, 0, 2, 0, 9, 0, 9, 0];
        let bags = read_records(&data, "pbag", BAG_SIZE, read_bag).unwrap();
        assert_eq!(bags, vec![Bag { gen_index: 1, mod_index: 2 }]);
    }

    #[test]
    fn amount_reads_as_range() {
        let amount = GenAmount::from_range(36, 72);
        assert_eq!(amount.range(), (36, 72));
        assert_eq!(GenAmount::from_i16(-12000).as_i16(), -12000);
    }

    #[test]
    fn zone_slice_uses_next_bag_as_end() {
        let bags = [
            Bag { gen_index: 0, mod_index: 0 },
            Bag { gen_index: 2, mod_index: 0 },
        ];
        let gens = [
            GeneratorRecord::new(17, 100),
            GeneratorRecord::new(53, 0),
            GeneratorRecord::new(53, 1),
        ];
        assert_eq!(zone_slice(&bags, &gens, 0).len(), 2);
        assert_eq!(zone_slice(&bags, &gens, 1).len(), 1);
        assert!(zone_slice(&bags, &gens, 5).is_empty());
    }
}
