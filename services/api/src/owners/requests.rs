use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SetDisplayNameRequest {
    pub display_name: String,
}
