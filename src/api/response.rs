use serde::Serialize;

/// Response wrapper in the dashboard's wire shape: `status` 1 on success with
/// the payload's fields flattened alongside `msg`.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub status: u8,
    pub msg: String,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl Envelope<()> {
    /// Success with a message and no payload.
    pub fn ok(msg: impl Into<String>) -> Envelope<()> {
        Envelope { status: 1, msg: msg.into(), data: None }
    }
}

impl<T: Serialize> Envelope<T> {
    /// Success with a message and a flattened payload.
    pub fn ok_with(msg: impl Into<String>, data: T) -> Self {
        Self { status: 1, msg: msg.into(), data: Some(data) }
    }
}
