pub mod media_engine;

use std::sync::Arc;

use interceptor::registry::Registry;

use crate::error::Result;
use crate::peer_connection::configuration::RTCConfiguration;
use crate::peer_connection::RTCPeerConnection;
use media_engine::MediaEngine;

// APIBuilder wires a MediaEngine and interceptor Registry into peer
// connections, the way applications compose the stack.
#[derive(Default)]
pub struct APIBuilder {
    media_engine: Option<MediaEngine>,
    registry: Option<Registry>,
}

impl APIBuilder {
    pub fn new() -> Self {
        APIBuilder::default()
    }

    pub fn with_media_engine(mut self, media_engine: MediaEngine) -> Self {
        self.media_engine = Some(media_engine);
        self
    }

    pub fn with_interceptor_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn build(self) -> API {
        API {
            media_engine: Arc::new(self.media_engine.unwrap_or_else(|| {
                let mut m = MediaEngine::default();
                let _ = m.register_default_codecs();
                m
            })),
            registry: Arc::new(self.registry.unwrap_or_else(default_registry)),
        }
    }
}

// register_default_interceptors installs the standard pipeline: reports,
// NACK generator/responder and TWCC feedback.
pub fn default_registry() -> Registry {
    let mut registry = Registry::new();
    registry.add(Box::new(interceptor::report::receiver_report::ReceiverReportBuilder::default()));
    registry.add(Box::new(interceptor::report::sender_report::SenderReportBuilder::default()));
    registry.add(Box::new(interceptor::nack::generator::GeneratorBuilder::default()));
    registry.add(Box::new(interceptor::nack::responder::ResponderBuilder::default()));
    registry.add(Box::new(interceptor::twcc::receiver::ReceiverBuilder::default()));
    registry.add(Box::new(interceptor::twcc::sender::SenderBuilder::default()));
    registry
}

pub struct API {
    pub(crate) media_engine: Arc<MediaEngine>,
    pub(crate) registry: Arc<Registry>,
}

impl API {
    pub async fn new_peer_connection(
        &self,
        configuration: RTCConfiguration,
    ) -> Result<Arc<RTCPeerConnection>> {
        RTCPeerConnection::new(
            configuration,
            self.media_engine.clone(),
            self.registry.clone(),
        )
        .await
    }
}
