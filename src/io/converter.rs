/// Frequency in Hz of a (possibly fractional) MIDI note number.
/// A4 = 440 Hz = MIDI note 69
#[inline]
pub fn midi_to_freq(note: f32) -> f32 {
    440.0 * 2.0_f32.powf((note - 69.0) / 12.0)
}

pub fn midi_note_to_freq(note: u8) -> f32 {
    midi_to_freq(note as f32)
}

/// Pitch wheel position in semitones for a 14-bit wheel value split into
/// `(lsb, msb)`. Centre (8192) is 0; the full throw is ±24 semitones.
pub fn pitch_wheel_to_semitones(lsb: u8, msb: u8) -> f32 {
    let value = (((msb & 0x7F) as u32) << 7) | (lsb & 0x7F) as u32;
    (value as f32 / 16384.0 - 0.5) * 48.0
}

/// Split a 14-bit wheel value into `(lsb, msb)` data bytes.
pub fn pitch_wheel_bytes(value: u16) -> (u8, u8) {
    ((value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8)
}
