// MIT License - Copyright (c) 2026 Peter Wright
// Bosch Mode 2 client

/// A single panel output (relay / switch).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    pub number: u16,
    pub text: String,
    pub on: bool,
}

impl Output {
    pub fn new(number: u16) -> Self {
        Self {
            number,
            text: String::new(),
            on: false,
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.text == text {
            return false;
        }
        self.text = text;
        true
    }

    /// Returns true if the on/off state changed.
    pub fn set_state(&mut self, on: bool) -> bool {
        if self.on == on {
            return false;
        }
        self.on = on;
        true
    }
}
