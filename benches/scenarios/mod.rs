//! Real-world scenario benchmarks.
//!
//! These model what the demo player does: SoundFont devices under
//! polyphonic load and the sequencer driving a multi-track song.

mod sequencer;
mod voices;

use std::sync::Arc;

use scoreplay::soundfont::builder::{InstrumentSpec, PresetSpec, SampleSpec};
use scoreplay::soundfont::generator::{GEN_INSTRUMENT, GEN_RELEASE_VOL_ENV, GEN_SAMPLE_ID, GEN_SAMPLE_MODES};
use scoreplay::soundfont::{GeneratorRecord, SoundFont, SoundFontBuilder, DRUM_BANK};

pub use sequencer::bench_sequencer;
pub use voices::bench_voices;

/// Program 0 is a looped sine, the drum bank a noise burst.
fn bank() -> Arc<SoundFont> {
    let mut builder = SoundFontBuilder::new("Bench");
    let tone = builder.add_sample(SampleSpec::sine("tone", 44_000, 69, 1_000));
    let noise = builder.add_sample(SampleSpec::click("noise", 44_100, 60, 8_000));

    let sine = builder.add_instrument(InstrumentSpec {
        name: "sine".into(),
        global: vec![GeneratorRecord::new(GEN_RELEASE_VOL_ENV, -2400)],
        zones: vec![vec![
            GeneratorRecord::new(GEN_SAMPLE_MODES, 1),
            GeneratorRecord::unsigned(GEN_SAMPLE_ID, tone),
        ]],
    });
    let kit = builder.add_instrument(InstrumentSpec {
        name: "kit".into(),
        global: Vec::new(),
        zones: vec![vec![GeneratorRecord::unsigned(GEN_SAMPLE_ID, noise)]],
    });
    for (program, bank, instrument) in [(0, 0, sine), (0, DRUM_BANK, kit)] {
        builder.add_preset(PresetSpec {
            name: format!("preset{bank}"),
            program,
            bank,
            global: Vec::new(),
            zones: vec![vec![GeneratorRecord::unsigned(GEN_INSTRUMENT, instrument)]],
        });
    }

    Arc::new(SoundFont::from_bytes(&builder.build()).expect("bench bank parses"))
}
