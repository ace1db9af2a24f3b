#[cfg(test)]
mod session_test;

use std::fmt;
use std::fmt::Write as _;

use rand::Rng;

use super::common::{Attribute, ConnectionInformation};
use super::media::{MediaDescription, MediaName};
use crate::error::{Error, Result};

// Origin is the o= line.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Origin {
    pub username: String,
    pub session_id: u64,
    pub session_version: u64,
    pub network_type: String,
    pub address_type: String,
    pub unicast_address: String,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.username,
            self.session_id,
            self.session_version,
            self.network_type,
            self.address_type,
            self.unicast_address
        )
    }
}

impl Origin {
    pub fn new() -> Self {
        Origin {
            username: "-".to_owned(),
            session_id: rand::thread_rng().gen::<u32>() as u64,
            session_version: rand::thread_rng().gen::<u32>() as u64,
            network_type: "IN".to_owned(),
            address_type: "IP4".to_owned(),
            unicast_address: "0.0.0.0".to_owned(),
        }
    }
}

// TimeDescription is the t= line. WebRTC sessions are unbounded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TimeDescription {
    pub start_time: u64,
    pub stop_time: u64,
}

// SessionDescription is the semantic model of one SDP document: the
// session-level fields the stack consumes plus its media sections.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SessionDescription {
    pub version: u8,
    pub origin: Origin,
    pub session_name: String,
    pub connection_information: Option<ConnectionInformation>,
    pub time_descriptions: Vec<TimeDescription>,
    pub attributes: Vec<Attribute>,
    pub media_descriptions: Vec<MediaDescription>,
}

impl SessionDescription {
    // new_jsep_session_description creates the base every offer/answer
    // starts from, per the JSEP defaults.
    pub fn new_jsep_session_description() -> Self {
        SessionDescription {
            version: 0,
            origin: Origin::new(),
            session_name: "-".to_owned(),
            connection_information: None,
            time_descriptions: vec![TimeDescription::default()],
            attributes: vec![],
            media_descriptions: vec![],
        }
    }

    pub fn with_media(mut self, md: MediaDescription) -> Self {
        self.media_descriptions.push(md);
        self
    }

    pub fn with_value_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attributes.push(Attribute::new(key, Some(value.into())));
        self
    }

    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref())
    }

    // marshal renders the document; lines are CRLF separated per RFC 4566.
    pub fn marshal(&self) -> String {
        let mut out = String::new();
        let _ = write!(out, "v={}\r\n", self.version);
        let _ = write!(out, "o={}\r\n", self.origin);
        let _ = write!(out, "s={}\r\n", self.session_name);
        if let Some(ci) = &self.connection_information {
            let _ = write!(out, "c={ci}\r\n");
        }
        for td in &self.time_descriptions {
            let _ = write!(out, "t={} {}\r\n", td.start_time, td.stop_time);
        }
        for a in &self.attributes {
            let _ = write!(out, "a={a}\r\n");
        }
        for md in &self.media_descriptions {
            let _ = write!(out, "m={}\r\n", md.media_name);
            if let Some(title) = &md.media_title {
                let _ = write!(out, "i={title}\r\n");
            }
            if let Some(ci) = &md.connection_information {
                let _ = write!(out, "c={ci}\r\n");
            }
            for a in &md.attributes {
                let _ = write!(out, "a={a}\r\n");
            }
        }
        out
    }

    // unmarshal parses the fields this stack consumes; unknown lines are
    // preserved as attributes where legal and otherwise skipped.
    pub fn unmarshal(raw: &str) -> Result<Self> {
        let mut sd = SessionDescription::default();
        let mut current_media: Option<MediaDescription> = None;
        let mut seen_any = false;

        for line in raw.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            let (typ, value) = line
                .split_once('=')
                .ok_or_else(|| Error::SdpInvalidSyntax(line.to_owned()))?;
            seen_any = true;

            match typ {
                "v" => {
                    sd.version = value
                        .parse::<u8>()
                        .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?;
                }
                "o" => {
                    sd.origin = parse_origin(value)?;
                }
                "s" => {
                    sd.session_name = value.to_owned();
                }
                "t" => {
                    let (start, stop) = value
                        .split_once(' ')
                        .ok_or_else(|| Error::SdpInvalidSyntax(value.to_owned()))?;
                    sd.time_descriptions.push(TimeDescription {
                        start_time: start
                            .parse()
                            .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
                        stop_time: stop
                            .parse()
                            .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
                    });
                }
                "c" => {
                    let ci = parse_connection(value)?;
                    match &mut current_media {
                        Some(md) => md.connection_information = Some(ci),
                        None => sd.connection_information = Some(ci),
                    }
                }
                "m" => {
                    if let Some(md) = current_media.take() {
                        sd.media_descriptions.push(md);
                    }
                    current_media = Some(MediaDescription {
                        media_name: parse_media_name(value)?,
                        ..Default::default()
                    });
                }
                "a" => {
                    let attr = match value.split_once(':') {
                        Some((k, v)) => Attribute::new(k, Some(v.to_owned())),
                        None => Attribute::new(value, None),
                    };
                    match &mut current_media {
                        Some(md) => md.attributes.push(attr),
                        None => sd.attributes.push(attr),
                    }
                }
                "i" => {
                    if let Some(md) = &mut current_media {
                        md.media_title = Some(value.to_owned());
                    }
                }
                // b=, k=, u=, e=, p=, r=, z= are not consumed by this
                // stack; tolerated on input.
                _ => {}
            }
        }

        if let Some(md) = current_media.take() {
            sd.media_descriptions.push(md);
        }
        if !seen_any {
            return Err(Error::SdpEmpty);
        }

        Ok(sd)
    }
}

fn parse_origin(value: &str) -> Result<Origin> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 6 {
        return Err(Error::SdpInvalidSyntax(value.to_owned()));
    }
    Ok(Origin {
        username: fields[0].to_owned(),
        session_id: fields[1]
            .parse()
            .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
        session_version: fields[2]
            .parse()
            .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
        network_type: fields[3].to_owned(),
        address_type: fields[4].to_owned(),
        unicast_address: fields[5].to_owned(),
    })
}

fn parse_connection(value: &str) -> Result<ConnectionInformation> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() != 3 {
        return Err(Error::SdpInvalidSyntax(value.to_owned()));
    }
    Ok(ConnectionInformation {
        network_type: fields[0].to_owned(),
        address_type: fields[1].to_owned(),
        address: fields[2].to_owned(),
    })
}

fn parse_media_name(value: &str) -> Result<MediaName> {
    let fields: Vec<&str> = value.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(Error::SdpInvalidSyntax(value.to_owned()));
    }
    let (port, port_count) = match fields[1].split_once('/') {
        Some((p, c)) => (
            p.parse()
                .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
            c.parse()
                .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
        ),
        None => (
            fields[1]
                .parse()
                .map_err(|_| Error::SdpInvalidValue(value.to_owned()))?,
            1,
        ),
    };
    Ok(MediaName {
        media: fields[0].to_owned(),
        port,
        port_count,
        protos: fields[2].split('/').map(|s| s.to_owned()).collect(),
        formats: fields[3..].iter().map(|s| (*s).to_owned()).collect(),
    })
}
