use serde::Deserialize;
use crate::acquisition::ParseError;
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    A,
    B,
}
/// Prefix that tags which channel a line belongs to, e.g. `"A2:"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelIdentifier(String);
impl ChannelIdentifier {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self(prefix.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    /// Human name used for CSV columns and plot legends: `"A2:"` -> `"A2"`.
    pub fn label(&self) -> &str {
        self.0.trim().trim_end_matches(':').trim_end()
    }
}
/// How many readings a single line carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineFormat {
    /// One `<id><value>` reading per line.
    #[default]
    Single,
    /// Whitespace separated readings on one line, as the firmware prints them
    /// (`A2:1.23 A3:4.56`).
    Compound,
}
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    pub channel: Channel,
    pub value: f64,
}
pub struct SampleParser {
    first: ChannelIdentifier,
    second: ChannelIdentifier,
    format: LineFormat,
}
impl SampleParser {
    pub fn new(first: ChannelIdentifier, second: ChannelIdentifier, format: LineFormat) -> Self {
        Self {
            first,
            second,
            format,
        }
    }
    /// Channel A wins when a line starts with both prefixes.
    pub fn classify(&self, text: &str) -> Option<Channel> {
        if text.starts_with(self.first.as_str()) {
            Some(Channel::A)
        } else if text.starts_with(self.second.as_str()) {
            Some(Channel::B)
        } else {
            None
        }
    }
    /// Decodes every reading on `line`. An empty result means the line was
    /// not addressed to either channel. Compound lines are all-or-nothing.
    pub fn parse_line(&self, line: &str) -> Result<Vec<Reading>, ParseError> {
        match self.format {
            LineFormat::Single => Ok(self.parse_field(line)?.into_iter().collect()),
            LineFormat::Compound => line
                .split_whitespace()
                .filter_map(|token| self.parse_field(token).transpose())
                .collect(),
        }
    }
    fn parse_field(&self, text: &str) -> Result<Option<Reading>, ParseError> {
        let Some(channel) = self.classify(text) else {
            return Ok(None);
        };
        let value = decode_value(text)?;
        Ok(Some(Reading { channel, value }))
    }
}
/// Two-field decoder: `<tag>:<number>`, nothing more.
pub fn decode_value(field: &str) -> Result<f64, ParseError> {
    let (_, raw) = field
        .split_once(':')
        .ok_or_else(|| ParseError::MissingSeparator(field.to_string()))?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ParseError::EmptyValue(field.to_string()));
    }
    if raw.contains(':') {
        return Err(ParseError::ExtraField(field.to_string()));
    }
    raw.parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        line: field.to_string(),
        value: raw.to_string(),
    })
}
