/// Structure representing key identifier.
///
/// Holds a fingerprint, long key id or any other specification
/// understood by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    id: String
}


impl KeyId {
    /// Creates an identifier from any string-like value.
    ///
    /// * `id` - fingerprint, key id or user id
    pub fn new<S: Into<String>>(id: S) -> Self {
        KeyId { id: id.into() }
    }

    /// Returns the identifier as passed to the backend.
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// Check if identifier is empty.
    pub fn is_empty(&self) -> bool {
        self.id
            .trim()
            .is_empty()
    }
}


impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        KeyId::new(value)
    }
}


impl From<String> for KeyId {
    fn from(value: String) -> Self {
        KeyId::new(value)
    }
}


impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}
