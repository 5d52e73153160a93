//! User-supplied inputs to a pipeline run.

/// Text content of an uploaded transcript file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript(String);

#[derive(Debug, thiserror::Error)]
pub enum TranscriptError {
    #[error("transcript is not valid UTF-8 (at byte {0})")]
    NotUtf8(usize),
}

impl Transcript {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TranscriptError> {
        std::str::from_utf8(bytes)
            .map(|s| Self(s.to_string()))
            .map_err(|e| TranscriptError::NotUtf8(e.valid_up_to()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Sampling temperature shared by all three agents. Always within `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(f32);

#[derive(Debug, thiserror::Error)]
#[error("temperature must be between 0.0 and 1.0, got {0}")]
pub struct TemperatureError(pub f32);

impl Temperature {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 1.0;

    pub fn new(value: f32) -> Result<Self, TemperatureError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TemperatureError(value))
        }
    }

    pub fn value(self) -> f32 {
        self.0
    }
}

impl Default for Temperature {
    fn default() -> Self {
        Self(0.7)
    }
}

impl TryFrom<f32> for Temperature {
    type Error = TemperatureError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
