use serde::Serialize;

/// Console method a line was written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Log,
    Info,
    Warn,
    Error,
    Debug,
}

impl Channel {
    pub fn from_method(name: &str) -> Option<Self> {
        match name {
            "log" => Some(Channel::Log),
            "info" => Some(Channel::Info),
            "warn" => Some(Channel::Warn),
            "error" => Some(Channel::Error),
            "debug" => Some(Channel::Debug),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleLine {
    pub channel: Channel,
    pub text: String,
}

/// Captured console output with a byte ceiling.
#[derive(Debug, Default)]
pub struct Console {
    lines: Vec<ConsoleLine>,
    bytes: usize,
    limit: usize,
}

impl Console {
    pub fn new(limit: usize) -> Self {
        Self {
            lines: Vec::new(),
            bytes: 0,
            limit,
        }
    }

    /// Returns `false` once the byte ceiling has been crossed.
    pub fn write(&mut self, channel: Channel, text: String) -> bool {
        self.bytes += text.len() + 1;
        self.lines.push(ConsoleLine { channel, text });
        self.bytes <= self.limit
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn into_lines(self) -> Vec<ConsoleLine> {
        self.lines
    }
}
