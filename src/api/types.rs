use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest sampled value held by a source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Signal {
    pub value: f64,
    #[serde(with = "epoch_seconds")]
    pub generated_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            generated_at: Utc::now(),
        }
    }
}

/// One agent's combined value for one round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub value: f64,
    #[serde(with = "epoch_seconds")]
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    pub fn new(value: f64, decided_at: DateTime<Utc>) -> Self {
        Self { value, decided_at }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method")]
pub enum Request {
    #[serde(rename = "pull_signal_v1")]
    PullSignal,
    #[serde(rename = "register_v1")]
    Register { id: String },
    #[serde(rename = "submit_decision_v1")]
    SubmitDecision { decision: Decision, id: String },
    #[serde(rename = "deregister_v1")]
    Deregister { id: String },
}

impl Request {
    pub fn method(&self) -> &'static str {
        match self {
            Request::PullSignal => "pull_signal_v1",
            Request::Register { .. } => "register_v1",
            Request::SubmitDecision { .. } => "submit_decision_v1",
            Request::Deregister { .. } => "deregister_v1",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Signal { signal: Option<Signal> },
    Registered { accepted: bool },
    Ack,
    Error { message: String },
}

impl Response {
    pub fn unsupported(request: &Request) -> Self {
        Response::Error {
            message: format!("method {} not supported by this service", request.method()),
        }
    }
}

/// Timestamps travel as float seconds since the Unix epoch.
mod epoch_seconds {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        let secs = ts.timestamp() as f64 + f64::from(ts.timestamp_subsec_micros()) / 1e6;
        serializer.serialize_f64(secs)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        if !secs.is_finite() {
            return Err(de::Error::custom("timestamp is not a finite number"));
        }
        let micros = (secs * 1e6).round() as i64;
        DateTime::<Utc>::from_timestamp_micros(micros)
            .ok_or_else(|| de::Error::custom(format!("timestamp {} out of range", secs)))
    }
}
