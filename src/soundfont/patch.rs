use super::generator::Generator;

/// A MIDI `(program, bank)` instrument: the resolved zones of one preset.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub name: String,
    pub program: u16,
    pub bank: u16,
    pub generators: Vec<Generator>,
}

impl Patch {
    /// First zone whose key and velocity ranges contain the note.
    ///
    /// Overlapping zones are not layered: only the first match sounds.
    pub fn find_generator(&self, key: u8, velocity: u8) -> Option<&Generator> {
        self.generators.iter().find(|g| g.matches(key, velocity))
    }

    pub fn is_drum_kit(&self) -> bool {
        self.bank == 128
    }
}
