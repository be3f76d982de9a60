//! MIDI value helpers.

const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

#[inline]
pub fn is_valid_note(note: u8) -> bool {
    note <= 127
}

#[inline]
pub fn is_valid_velocity(velocity: u8) -> bool {
    velocity <= 127
}

#[inline]
pub fn is_valid_channel(channel: u8) -> bool {
    channel <= 15
}

/// Scientific pitch name with middle C (60) as `C4`.
pub fn note_name(note: u8) -> String {
    let octave = note as i32 / 12 - 1;
    format!("{}{}", NOTE_NAMES[(note % 12) as usize], octave)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_name() {
        assert_eq!(note_name(45), "A2");
        assert_eq!(note_name(60), "C4");
        assert_eq!(note_name(0), "C-1");
        assert_eq!(note_name(127), "G9");
        assert_eq!(note_name(61), "C#4");
    }

    #[test]
    fn test_ranges() {
        assert!(is_valid_note(127));
        assert!(!is_valid_note(128));
        assert!(is_valid_velocity(0));
        assert!(!is_valid_velocity(200));
        assert!(is_valid_channel(15));
        assert!(!is_valid_channel(16));
    }
}
