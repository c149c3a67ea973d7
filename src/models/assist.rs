use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ContentRequest {
    pub content: Option<String>,
}
