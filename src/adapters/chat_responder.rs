use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::domain::config::ResponderConfig;
use crate::domain::{DomainError, FlightContext, FlightData, Language};
use crate::ports::{AtcResponder, HttpClient};

const BASE_PROMPT_EN: &str = "You are an air traffic controller. Reply to the pilot \
using standard ICAO phraseology. Keep replies short, read back the callsign, and \
never add commentary outside the transmission.";

const BASE_PROMPT_ZH: &str = "你是一名空中交通管制员。请使用标准的中国民航陆空通话用语回复飞行员，\
回复要简短，先呼号后指令，不要添加通话以外的内容。";

const FEET_TO_METERS: f64 = 0.3048;

/// Generates controller replies through an OpenAI-compatible chat endpoint.
pub struct ChatCompletionResponder {
    http: Arc<dyn HttpClient>,
    config: ResponderConfig,
}

impl ChatCompletionResponder {
    pub fn new(http: Arc<dyn HttpClient>, config: ResponderConfig) -> Self {
        Self { http, config }
    }

    /// Phraseology rules, then the live flight picture when there is one.
    fn system_prompt(language: Language, context: &FlightContext) -> String {
        let base = match language {
            Language::Zh => BASE_PROMPT_ZH,
            Language::En => BASE_PROMPT_EN,
        };
        let situation = match &context.flight {
            Some(flight) => Self::flight_section(language, flight, context),
            None => Self::no_flight_section(language).to_string(),
        };
        format!("{}\n\n{}", base, situation)
    }

    fn flight_section(language: Language, flight: &FlightData, context: &FlightContext) -> String {
        let phase = context.phase;
        match language {
            Language::Zh => format!(
                "实时飞行数据：\n\
                 - 呼号：{callsign}\n\
                 - 高度：{alt_m:.0} 米（{alt:.0} 英尺）\n\
                 - 速度：{speed:.0} 节\n\
                 - 航向：{heading:.0}°\n\
                 - 垂直速度：{vs_m:.0} 米/分钟\n\n\
                 当前飞行阶段：{phase_name}\n{guidance}\n\n\
                 回复中必须使用呼号 {callsign}，根据实际高度和速度只给一条指令，不超过30字。",
                callsign = flight.callsign,
                alt_m = flight.altitude * FEET_TO_METERS,
                alt = flight.altitude,
                speed = flight.speed,
                heading = flight.heading,
                vs_m = flight.vertical_speed * FEET_TO_METERS,
                phase_name = phase.display_name(language),
                guidance = phase.guidance(language),
            ),
            Language::En => format!(
                "Real-time flight data:\n\
                 - Callsign: {callsign}\n\
                 - Altitude: {alt:.0} feet\n\
                 - Speed: {speed:.0} knots\n\
                 - Heading: {heading:.0}°\n\
                 - Vertical speed: {vs:.0} fpm\n\n\
                 Current flight phase: {phase_name}\n{guidance}\n\n\
                 Use the callsign {callsign} and give one instruction that fits the actual \
                 altitude and speed, in under 20 words.",
                callsign = flight.callsign,
                alt = flight.altitude,
                speed = flight.speed,
                heading = flight.heading,
                vs = flight.vertical_speed,
                phase_name = phase.display_name(language),
                guidance = phase.guidance(language),
            ),
        }
    }

    fn no_flight_section(language: Language) -> &'static str {
        match language {
            Language::Zh => {
                "当前没有模拟器飞行数据。如果飞行员呼叫，请回复：\
                 \"请先连接模拟器，我需要飞行数据才能提供管制服务。\""
            }
            Language::En => {
                "No simulator flight data is available. If the pilot calls, reply: \
                 \"Please connect the simulator first. I need flight data to provide ATC service.\""
            }
        }
    }

    fn request_body(
        &self,
        message: &str,
        language: Language,
        context: &FlightContext,
    ) -> serde_json::Value {
        json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": Self::system_prompt(language, context) },
                { "role": "user", "content": message },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }

    fn api_key(&self) -> Option<String> {
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[async_trait]
impl AtcResponder for ChatCompletionResponder {
    async fn get_atc_response(
        &self,
        message: &str,
        language: Language,
        context: &FlightContext,
    ) -> Result<String, DomainError> {
        let api_key = self.api_key();
        if api_key.is_none() {
            warn!(env = %self.config.api_key_env, "No responder API key set, sending unauthenticated request");
        }

        let body = self.request_body(message, language, context);
        let reply = self
            .http
            .post_json(&self.config.api_url, api_key.as_deref(), &body)
            .await?;

        let content = reply["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .ok_or_else(|| DomainError::ResponseFailed {
                transcript: message.to_string(),
                reason: "responder returned no message content".to_string(),
            })?;

        debug!(
            language = %language,
            phase = %context.phase,
            has_flight_data = context.flight.is_some(),
            chars = content.len(),
            "ATC response generated"
        );
        Ok(content.to_string())
    }
}
