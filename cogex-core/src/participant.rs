use thiserror::Error;

pub const MIN_AGE: u32 = 5;
pub const MAX_AGE: u32 = 120;

/// Consent input that failed validation. The participant is re-prompted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("age {age} is outside 5..=120")]
    AgeOutOfRange { age: u32 },
}

/// Participant metadata captured at consent time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    name: String,
    age: u32,
}

impl Participant {
    pub fn new(name: &str, age: u32) -> Result<Self, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            return Err(ValidationError::AgeOutOfRange { age });
        }
        Ok(Self {
            name: name.to_string(),
            age,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> u32 {
        self.age
    }
}
