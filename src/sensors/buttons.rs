//! Button press/release edge queue.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonEdge {
    pub id: String,
    pub btn_num: Option<u32>,
    pub pressed: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawButtonEvent {
    #[serde(default)]
    pub btn_num: Option<u32>,
    pub pressed: bool,
}

impl ButtonEdge {
    pub fn from_raw(id: &str, raw: RawButtonEvent) -> Self {
        Self {
            id: id.to_string(),
            btn_num: raw.btn_num,
            pressed: raw.pressed,
        }
    }
}
