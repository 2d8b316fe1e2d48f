use std::collections::BTreeMap;

/// How a driver reports failures. Handles always run in [`ErrorMode::Raise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    Silent,
    Warning,
    Raise,
}

/// Shape of a fetched row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Column name → value.
    #[default]
    Assoc,
    /// Values by position.
    Num,
    /// A single column of each row (0-indexed).
    Column(usize),
}

/// Type hint passed to native quoting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    Str,
    Int,
    Bool,
    Lob,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum Attribute {
    ErrorMode,
    DefaultFetchMode,
    Persistent,
    /// Connect / busy timeout in seconds.
    Timeout,
    /// SQL run once right after the native connection opens.
    InitCommand,
    /// Driver specific attribute, passed through untouched.
    Custom(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    ErrorMode(ErrorMode),
    FetchMode(FetchMode),
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Attribute → value map handed to the native driver on open and prepare.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionOptions {
    attrs: BTreeMap<Attribute, OptionValue>,
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attr: Attribute, value: OptionValue) -> Self {
        self.attrs.insert(attr, value);
        self
    }

    pub fn set(&mut self, attr: Attribute, value: OptionValue) {
        self.attrs.insert(attr, value);
    }

    pub fn get(&self, attr: &Attribute) -> Option<&OptionValue> {
        self.attrs.get(attr)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Attribute, &OptionValue)> {
        self.attrs.iter()
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        match self.attrs.get(&Attribute::Timeout) {
            Some(OptionValue::Int(n)) if *n > 0 => Some(*n as u64),
            _ => None,
        }
    }

    pub fn init_command(&self) -> Option<&str> {
        match self.attrs.get(&Attribute::InitCommand) {
            Some(OptionValue::Str(s)) if !s.is_empty() => Some(s),
            _ => None,
        }
    }

    pub fn fetch_mode(&self) -> FetchMode {
        match self.attrs.get(&Attribute::DefaultFetchMode) {
            Some(OptionValue::FetchMode(m)) => *m,
            _ => FetchMode::Assoc,
        }
    }

    /// Overrides the error-reporting mode and the default fetch shape,
    /// whatever the caller asked for.
    pub(crate) fn pinned(mut self) -> Self {
        self.attrs.insert(
            Attribute::ErrorMode,
            OptionValue::ErrorMode(ErrorMode::Raise),
        );
        self.attrs.insert(
            Attribute::DefaultFetchMode,
            OptionValue::FetchMode(FetchMode::Assoc),
        );
        self
    }
}
