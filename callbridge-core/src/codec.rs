//! Engine-side codec descriptions

use crate::types::{Direction, MediaType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named codec parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CodecParameter {
    /// Parameter name
    pub name: String,
    /// Parameter value
    pub value: String,
}

/// RTCP feedback message supported for a codec
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeedbackParameter {
    /// Feedback type, e.g. `nack`
    pub kind: String,
    /// Feedback subtype, e.g. `pli`
    pub subtype: String,
    /// Extra parameters, possibly empty
    pub extra_params: String,
}

/// Codec as understood by the media engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Codec {
    /// RTP payload type
    pub payload_type: u32,
    /// Encoding name
    pub encoding_name: String,
    /// Media type
    pub media_type: MediaType,
    /// Clock rate in Hz
    pub clock_rate: u32,
    /// Channel count
    pub channels: u32,
    /// Optional codec parameters
    pub optional_params: Vec<CodecParameter>,
    /// Minimum RTCP reporting interval in milliseconds, `None` when unset
    pub minimum_reporting_interval: Option<u32>,
    /// RTCP feedback messages
    pub feedback_params: Vec<FeedbackParameter>,
}

impl Codec {
    /// Create a codec with no parameters
    pub fn new(
        payload_type: u32,
        encoding_name: impl Into<String>,
        media_type: MediaType,
        clock_rate: u32,
    ) -> Self {
        Self {
            payload_type,
            encoding_name: encoding_name.into(),
            media_type,
            clock_rate,
            channels: 0,
            optional_params: Vec::new(),
            minimum_reporting_interval: None,
            feedback_params: Vec::new(),
        }
    }

    /// Builder-style channel count
    pub fn with_channels(mut self, channels: u32) -> Self {
        self.channels = channels;
        self
    }

    /// Append an optional parameter
    pub fn add_optional_parameter(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.optional_params.push(CodecParameter {
            name: name.into(),
            value: value.into(),
        });
    }

    /// Append an RTCP feedback parameter
    pub fn add_feedback_parameter(
        &mut self,
        kind: impl Into<String>,
        subtype: impl Into<String>,
        extra_params: impl Into<String>,
    ) {
        self.feedback_params.push(FeedbackParameter {
            kind: kind.into(),
            subtype: subtype.into(),
            extra_params: extra_params.into(),
        });
    }

    /// Look up an optional parameter by name
    pub fn optional_parameter(&self, name: &str) -> Option<&str> {
        self.optional_params
            .iter()
            .find(|p| p.name == name)
            .map(|p| p.value.as_str())
    }

    /// Semantic equality, ignoring the order of parameters
    pub fn same_as(&self, other: &Codec) -> bool {
        if self.payload_type != other.payload_type
            || !self.encoding_name.eq_ignore_ascii_case(&other.encoding_name)
            || self.media_type != other.media_type
            || self.clock_rate != other.clock_rate
            || self.channels != other.channels
            || self.minimum_reporting_interval != other.minimum_reporting_interval
        {
            return false;
        }

        let mut ours = self.optional_params.clone();
        let mut theirs = other.optional_params.clone();
        ours.sort();
        theirs.sort();
        if ours != theirs {
            return false;
        }

        let mut ours = self.feedback_params.clone();
        let mut theirs = other.feedback_params.clone();
        ours.sort();
        theirs.sort();
        ours == theirs
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} {} clock:{} channels:{}",
            self.payload_type, self.media_type, self.encoding_name, self.clock_rate, self.channels
        )?;
        for param in &self.optional_params {
            write!(f, " {}={}", param.name, param.value)?;
        }
        Ok(())
    }
}

/// Element-wise codec list comparison using [`Codec::same_as`]
pub fn codec_lists_equal(a: &[Codec], b: &[Codec]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_as(y))
}

/// Negotiated RTP header extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtpHeaderExtension {
    /// Extension id
    pub id: u32,
    /// Direction the extension applies to
    pub direction: Direction,
    /// Extension URI
    pub uri: String,
}
