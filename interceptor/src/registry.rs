use std::sync::Arc;

use crate::chain::Chain;
use crate::{Interceptor, InterceptorBuilder, Result};

// Registry collects interceptor builders; each peer connection builds
// its own chain from them.
#[derive(Default)]
pub struct Registry {
    builders: Vec<Box<dyn InterceptorBuilder + Send + Sync>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry { builders: vec![] }
    }

    pub fn add(&mut self, builder: Box<dyn InterceptorBuilder + Send + Sync>) {
        self.builders.push(builder);
    }

    pub fn build(&self, id: &str) -> Result<Arc<dyn Interceptor + Send + Sync>> {
        let mut interceptors = vec![];
        for b in &self.builders {
            interceptors.push(b.build(id)?);
        }
        Ok(Arc::new(Chain::new(interceptors)))
    }
}
