use std::fmt;

use super::common::{Attribute, ConnectionInformation};
use crate::error::{Error, Result};

// MediaName is the m= line: media type, port, protocols and formats.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaName {
    pub media: String,
    pub port: u16,
    pub port_count: u16,
    pub protos: Vec<String>,
    pub formats: Vec<String>,
}

impl fmt::Display for MediaName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = if self.port_count > 1 {
            format!("{}/{}", self.port, self.port_count)
        } else {
            self.port.to_string()
        };
        write!(
            f,
            "{} {} {} {}",
            self.media,
            port,
            self.protos.join("/"),
            self.formats.join(" ")
        )
    }
}

// MediaDescription is one m-section with its attributes.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MediaDescription {
    pub media_name: MediaName,
    pub media_title: Option<String>,
    pub connection_information: Option<ConnectionInformation>,
    pub attributes: Vec<Attribute>,
}

impl MediaDescription {
    // attribute returns the first value for key; Some(None) for a bare
    // flag attribute, None when absent.
    pub fn attribute(&self, key: &str) -> Option<Option<&str>> {
        self.attributes
            .iter()
            .find(|a| a.key == key)
            .map(|a| a.value.as_deref())
    }

    pub fn attributes_with_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .filter_map(|a| a.value.as_deref())
    }

    pub fn with_value_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, Some(value.into())));
        self
    }

    pub fn with_property_attribute(mut self, key: impl Into<String>) -> Self {
        self.attributes.push(Attribute::new(key, None));
        self
    }

    // with_codec appends the format plus its rtpmap/fmtp attributes.
    pub fn with_codec(
        mut self,
        payload_type: u8,
        name: &str,
        clockrate: u32,
        channels: u16,
        fmtp: &str,
    ) -> Self {
        self.media_name.formats.push(payload_type.to_string());
        let rtpmap = if channels > 0 {
            format!("{payload_type} {name}/{clockrate}/{channels}")
        } else {
            format!("{payload_type} {name}/{clockrate}")
        };
        self = self.with_value_attribute("rtpmap", rtpmap);
        if !fmtp.is_empty() {
            self = self.with_value_attribute("fmtp", format!("{payload_type} {fmtp}"));
        }
        self
    }

    pub fn mid(&self) -> Option<&str> {
        self.attribute("mid").flatten()
    }
}

// Codec is the parsed rtpmap/fmtp/rtcp-fb view of one payload type.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Codec {
    pub payload_type: u8,
    pub name: String,
    pub clock_rate: u32,
    pub encoding_parameters: String,
    pub fmtp: String,
    pub rtcp_feedback: Vec<String>,
}

impl MediaDescription {
    // codecs parses every negotiated codec of this m-section.
    pub fn codecs(&self) -> Vec<Codec> {
        let mut codecs: Vec<Codec> = vec![];

        for value in self.attributes_with_key("rtpmap") {
            if let Ok(codec) = parse_rtpmap(value) {
                codecs.push(codec);
            }
        }

        for value in self.attributes_with_key("fmtp") {
            if let Some((pt, fmtp)) = value.split_once(' ') {
                if let Ok(pt) = pt.parse::<u8>() {
                    if let Some(codec) = codecs.iter_mut().find(|c| c.payload_type == pt) {
                        codec.fmtp = fmtp.to_owned();
                    }
                }
            }
        }

        for value in self.attributes_with_key("rtcp-fb") {
            if let Some((pt, fb)) = value.split_once(' ') {
                if let Ok(pt) = pt.parse::<u8>() {
                    if let Some(codec) = codecs.iter_mut().find(|c| c.payload_type == pt) {
                        codec.rtcp_feedback.push(fb.to_owned());
                    }
                }
            }
        }

        codecs
    }

    pub fn codec_for_payload_type(&self, payload_type: u8) -> Result<Codec> {
        self.codecs()
            .into_iter()
            .find(|c| c.payload_type == payload_type)
            .ok_or(Error::CodecNotFound)
    }

    // ssrcs returns every distinct SSRC announced with a=ssrc lines.
    pub fn ssrcs(&self) -> Vec<u32> {
        let mut out = vec![];
        for value in self.attributes_with_key("ssrc") {
            if let Some(ssrc) = value
                .split_whitespace()
                .next()
                .and_then(|v| v.parse::<u32>().ok())
            {
                if !out.contains(&ssrc) {
                    out.push(ssrc);
                }
            }
        }
        out
    }

    // ssrc_group_fid returns the (media, rtx) pair of a ssrc-group:FID.
    pub fn ssrc_group_fid(&self) -> Option<(u32, u32)> {
        for value in self.attributes_with_key("ssrc-group") {
            let mut fields = value.split_whitespace();
            if fields.next() != Some("FID") {
                continue;
            }
            let media = fields.next()?.parse::<u32>().ok()?;
            let rtx = fields.next()?.parse::<u32>().ok()?;
            return Some((media, rtx));
        }
        None
    }
}

// parse_rtpmap parses "<pt> <name>/<clock>[/<params>]".
fn parse_rtpmap(value: &str) -> Result<Codec> {
    let (pt, rest) = value
        .split_once(' ')
        .ok_or_else(|| Error::SdpInvalidSyntax(value.to_owned()))?;
    let payload_type = pt
        .parse::<u8>()
        .map_err(|_| Error::SdpInvalidValue(pt.to_owned()))?;

    let mut split = rest.split('/');
    let name = split
        .next()
        .ok_or_else(|| Error::SdpInvalidSyntax(rest.to_owned()))?;
    let clock_rate = split
        .next()
        .unwrap_or("0")
        .parse::<u32>()
        .map_err(|_| Error::SdpInvalidValue(rest.to_owned()))?;
    let encoding_parameters = split.next().unwrap_or("").to_owned();

    Ok(Codec {
        payload_type,
        name: name.to_owned(),
        clock_rate,
        encoding_parameters,
        fmtp: String::new(),
        rtcp_feedback: vec![],
    })
}
