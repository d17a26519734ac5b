//! Wire message shape

use serde::{Deserialize, Serialize};
use trellis_core::{MessageCode, ServiceError, Variant};

/// The message every transport adapter carries
///
/// `cid` is the caller's correlation id, echoed back in responses. `reply`
/// lets a request ask for its response to be framed under a different
/// address, mailbox style.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub code: MessageCode,
    pub cid: u64,
    pub adr: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Variant>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
}

impl Message {
    pub fn request(cid: u64, adr: impl Into<String>) -> Self {
        Message {
            code: MessageCode::Request,
            cid,
            adr: adr.into(),
            data: None,
            reply: None,
        }
    }

    pub fn event(cid: u64, adr: impl Into<String>) -> Self {
        Message {
            code: MessageCode::Event,
            cid,
            adr: adr.into(),
            data: None,
            reply: None,
        }
    }

    pub fn with_data(mut self, data: Variant) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }

    /// Address a response to this message is framed under
    pub fn response_address(&self) -> &str {
        match &self.reply {
            Some(reply) => reply,
            None => &self.adr,
        }
    }

    /// Success response carrying the invocation result
    pub fn success(&self, data: Option<Variant>) -> Message {
        Message {
            code: MessageCode::Success,
            cid: self.cid,
            adr: self.response_address().to_string(),
            data,
            reply: None,
        }
    }

    /// Error response with an explicit code; the body carries the message,
    /// the code, and the hint when one is given.
    pub fn error(
        &self,
        code: MessageCode,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Message {
        let mut body: Vec<(String, Variant)> = vec![
            ("message".into(), Variant::Str(message.into())),
            ("code".into(), Variant::U16(code.to_u16())),
        ];
        if let Some(hint) = hint {
            body.push(("hint".into(), Variant::Str(hint)));
        }
        Message {
            code,
            cid: self.cid,
            adr: self.response_address().to_string(),
            data: Some(Variant::map(body)),
            reply: None,
        }
    }

    /// Response for a failed service invocation
    ///
    /// A classified failure keeps its own code and hint. A fault becomes an
    /// internal error whose body carries only the message.
    pub fn service_error(&self, err: &ServiceError) -> Message {
        match err {
            ServiceError::Failure {
                code,
                message,
                hint,
            } => self.error(*code, message.clone(), hint.clone()),
            ServiceError::Fault(message) => Message {
                code: MessageCode::InternalError,
                cid: self.cid,
                adr: self.response_address().to_string(),
                data: Some(Variant::map([("message", Variant::Str(message.clone()))])),
                reply: None,
            },
        }
    }

    pub fn is_request(&self) -> bool {
        self.code.is_request()
    }

    pub fn is_response(&self) -> bool {
        !self.code.is_request()
    }
}
