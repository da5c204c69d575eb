use uuid::Uuid;

#[derive(Debug, Hash, Clone, PartialEq, Eq)]
pub struct SessionId(Box<str>);

impl SessionId {
    pub fn new() -> Self {
        SessionId(Uuid::now_v7().to_string().into_boxed_str())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value.into_boxed_str())
    }
}
