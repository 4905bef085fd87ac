use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantLoginPayload {
    pub matric_number: String,
    pub password: String,
}
