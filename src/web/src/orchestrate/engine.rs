use crate::config::ServerConfig;
use league_core::r#match::MatchSpec;
use log::debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineOutcome {
    Dispatched,
    /// No engine endpoint configured; results arrive through the batch path.
    BatchMode,
}

#[derive(Debug)]
pub enum EngineError {
    Transport(reqwest::Error),
    Status(u16),
}

impl EngineError {
    /// Coarse error class for log lines, mirroring what an operator greps for.
    pub fn class(&self) -> &'static str {
        match self {
            EngineError::Transport(e) if e.is_timeout() => "EngineTimeout",
            EngineError::Transport(_) => "EngineTransportError",
            EngineError::Status(_) => "EngineStatusError",
        }
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::Transport(e) => write!(f, "engine transport error: {}", e),
            EngineError::Status(code) => write!(f, "engine dispatch returned {}", code),
        }
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(e: reqwest::Error) -> Self {
        EngineError::Transport(e)
    }
}

/// Outbound adapter for the external simulation engine. One bounded POST per
/// match; a failure here never rolls back the `running` transition, recovery
/// belongs to the watchdog.
pub struct EngineClient {
    url: Option<String>,
    secret: Option<String>,
    client: reqwest::Client,
}

impl EngineClient {
    pub fn new(config: &ServerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.engine_timeout)
            .build()
            .expect("reqwest client builds with static config");
        EngineClient {
            url: config.engine_url.clone(),
            secret: config.engine_secret.clone(),
            client,
        }
    }

    pub async fn dispatch(&self, spec: &MatchSpec) -> Result<EngineOutcome, EngineError> {
        let Some(url) = &self.url else {
            debug!("no engine endpoint configured; batch mode for {}", spec.match_id);
            return Ok(EngineOutcome::BatchMode);
        };

        let mut request = self.client.post(url).json(spec);
        if let Some(secret) = &self.secret {
            request = request.bearer_auth(secret);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(EngineError::Status(response.status().as_u16()));
        }
        Ok(EngineOutcome::Dispatched)
    }
}
