use log::Level;
use std::fmt;

/*
 * A structured log record: a message plus key/value fields.
 */
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl Record {

    pub fn new(level: Level, message: &str) -> Self {
	Self{
	    level: level,
	    message: message.to_string(),
	    fields: Vec::new(),
	}
    }

    pub fn debug(message: &str) -> Self {
	Self::new(Level::Debug, message)
    }

    pub fn info(message: &str) -> Self {
	Self::new(Level::Info, message)
    }

    pub fn warn(message: &str) -> Self {
	Self::new(Level::Warn, message)
    }

    pub fn error(message: &str) -> Self {
	Self::new(Level::Error, message)
    }

    pub fn field(mut self, key: &str, value: impl fmt::Display) -> Self {
	self.fields.push((key.to_string(), value.to_string()));
	self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
	self.fields.iter()
	    .find(|(k, _)| k == key)
	    .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
	write!(f, "{}", self.message)?;
	for (key, value) in &self.fields {
	    write!(f, " {}={:?}", key, value)?;
	}
	Ok(())
    }
}

/*
 * Where the quota manager reports what it did. Handed to the manager rather
 * than reached through the global logger so the tests can look at it.
 */
pub trait EventSink: Send + Sync {
    fn emit(&self, record: Record);
}

/* forwards records to the `log` facade (env_logger in the binary) */
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, record: Record) {
	log::log!(target: "quotam", record.level, "{}", record);
    }
}
