//! Key input the render pipeline reacts to.

use winit::keyboard::KeyCode;

/// A key the pipeline handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKey {
    /// Digit 0-9, fed to the render path selector.
    Digit(u8),
    /// Write the profiler summary to the log.
    LogProfile,
}

/// Translates a physical key; every other key is left to the host.
pub fn translate_key(key: KeyCode) -> Option<PipelineKey> {
    let digit = match key {
        KeyCode::Digit0 => 0,
        KeyCode::Digit1 => 1,
        KeyCode::Digit2 => 2,
        KeyCode::Digit3 => 3,
        KeyCode::Digit4 => 4,
        KeyCode::Digit5 => 5,
        KeyCode::Digit6 => 6,
        KeyCode::Digit7 => 7,
        KeyCode::Digit8 => 8,
        KeyCode::Digit9 => 9,
        KeyCode::KeyP => return Some(PipelineKey::LogProfile),
        _ => return None,
    };
    Some(PipelineKey::Digit(digit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digits() {
        assert_eq!(translate_key(KeyCode::Digit0), Some(PipelineKey::Digit(0)));
        assert_eq!(translate_key(KeyCode::Digit9), Some(PipelineKey::Digit(9)));
    }

    #[test]
    fn test_profile_key() {
        assert_eq!(translate_key(KeyCode::KeyP), Some(PipelineKey::LogProfile));
    }

    #[test]
    fn test_other_keys_ignored() {
        assert_eq!(translate_key(KeyCode::Numpad1), None);
        assert_eq!(translate_key(KeyCode::Delete), None);
        assert_eq!(translate_key(KeyCode::KeyW), None);
    }
}
