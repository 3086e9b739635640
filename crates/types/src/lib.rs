//! Validated text types shared by the clinic crates.
//!
//! Registration input arrives as free text from the API boundary. These wrappers make the
//! "must not be blank" and "must fit the column" rules part of the type, so the lifecycle
//! engine never sees an unvalidated patient name, id card number or phone number.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The trimmed input was longer than the permitted number of characters
    #[error("Text exceeds maximum length of {max} characters")]
    TooLong { max: usize },
    /// The input contained characters outside the permitted set
    #[error("Text contains invalid characters: {0}")]
    InvalidCharacters(String),
}

/// A string type that guarantees non-empty content.
///
/// This type wraps a `String` and ensures it contains at least one non-whitespace character.
/// The input is automatically trimmed of leading and trailing whitespace during construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the trimmed
    /// result is empty, an error is returned.
    ///
    /// # Errors
    ///
    /// Returns `Err(TextError::Empty)` if the input is empty or contains only whitespace.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper and returns the owned string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl serde::Serialize for NonEmptyText {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> serde::Deserialize<'de> for NonEmptyText {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NonEmptyText::new(&s).map_err(serde::de::Error::custom)
    }
}

/// A contact phone number.
///
/// Stored as entered (after trimming) so that extensions and country prefixes survive, but
/// limited to [`PhoneNumber::MAX_LEN`] characters drawn from digits, spaces and `+-()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhoneNumber(NonEmptyText);

impl PhoneNumber {
    /// Column width of the phone field.
    pub const MAX_LEN: usize = 20;

    /// Validates and wraps a phone number.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`], [`TextError::TooLong`] or
    /// [`TextError::InvalidCharacters`].
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let text = NonEmptyText::new(input)?;
        if text.as_str().chars().count() > Self::MAX_LEN {
            return Err(TextError::TooLong { max: Self::MAX_LEN });
        }
        let ok = text
            .as_str()
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'));
        if !ok {
            return Err(TextError::InvalidCharacters(text.into_string()));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_string(self) -> String {
        self.0.into_string()
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for PhoneNumber {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> serde::Deserialize<'de> for PhoneNumber {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        PhoneNumber::parse(&s).map_err(serde::de::Error::custom)
    }
}
