use crate::chat::ChatService;
use crate::generate::ResponseGenerator;
use std::sync::Arc;

pub(crate) struct ServerState<G: ResponseGenerator> {
    service: Arc<ChatService<G>>,
}

impl<G: ResponseGenerator> ServerState<G> {
    pub(crate) fn new(service: Arc<ChatService<G>>) -> Self {
        Self { service }
    }

    pub(crate) fn service(&self) -> Arc<ChatService<G>> {
        Arc::clone(&self.service)
    }
}
