use std::fmt;

// Attribute is one a= line: a bare flag or a key:value pair.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key: String,
    pub value: Option<String>,
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "{}:{}", self.key, v),
            None => write!(f, "{}", self.key),
        }
    }
}

impl Attribute {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Attribute {
            key: key.into(),
            value,
        }
    }

    pub fn is_ice_candidate(&self) -> bool {
        self.key == "candidate"
    }
}

// ConnectionInformation is the c= line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionInformation {
    pub network_type: String,
    pub address_type: String,
    pub address: String,
}

impl fmt::Display for ConnectionInformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.network_type, self.address_type, self.address)
    }
}
