use crate::error::SandboxError;
use serde::{Deserialize, Serialize};

/// A named viewport size used to test responsive behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewportPreset {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl ViewportPreset {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    /// Mobile (360x640), Tablet (768x1024) and Desktop (1280x720), in that order.
    pub fn reference_set() -> Vec<Self> {
        vec![
            Self::new("Mobile", 360, 640),
            Self::new("Tablet", 768, 1024),
            Self::new("Desktop", 1280, 720),
        ]
    }

    /// # Errors
    ///
    /// Returns [`SandboxError::InvalidViewport`] if either dimension is zero.
    pub fn validate(&self) -> Result<(), SandboxError> {
        if self.width == 0 || self.height == 0 {
            return Err(SandboxError::InvalidViewport {
                name: self.name.clone(),
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Lowercase name usable in file names.
    pub fn slug(&self) -> String {
        self.name
            .chars()
            .map(|character| {
                if character.is_ascii_alphanumeric() {
                    character.to_ascii_lowercase()
                } else {
                    '-'
                }
            })
            .collect()
    }
}
