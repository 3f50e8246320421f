//! Shared state and fetch helpers handed to every action.

use binja_bridge::query::Params;
use binja_bridge::{active_file, Envelope, PostBody, Timeout, Transport};

/// What an action can reach: the upstream transport and nothing else.
#[derive(Clone)]
pub struct ActionContext {
    transport: Transport,
}

impl ActionContext {
    pub fn new(transport: Transport) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Best-effort active file; `(none)` on any failure.
    pub fn active_file(&self) -> String {
        active_file(&self.transport)
    }

    /// GET JSON with `params` as both query and request context.
    pub fn get_envelope(&self, endpoint: &str, params: Params, timeout: Timeout) -> Envelope {
        let file = self.active_file();
        self.get_envelope_for(file, endpoint, &params, &params, timeout)
    }

    /// GET JSON reported against a known file with a separate context.
    pub fn get_envelope_for(
        &self,
        file: String,
        endpoint: &str,
        query: &Params,
        context: &Params,
        timeout: Timeout,
    ) -> Envelope {
        let data = self.transport.get_json(endpoint, query, timeout);
        Envelope::from_json(data, file, context)
    }

    /// Form POST with `form` as both body and request context.
    pub fn post_envelope(&self, endpoint: &str, form: Params, timeout: Timeout) -> Envelope {
        let file = self.active_file();
        let data = self
            .transport
            .post_json(endpoint, PostBody::Form(form.clone()), timeout);
        Envelope::from_json(data, file, &form)
    }

    /// Form POST with an explicit request context.
    pub fn post_envelope_with(
        &self,
        endpoint: &str,
        form: Params,
        context: &Params,
        timeout: Timeout,
    ) -> Envelope {
        let file = self.active_file();
        let data = self.transport.post_json(endpoint, PostBody::Form(form), timeout);
        Envelope::from_json(data, file, context)
    }
}
