//! Single-use middleware pipeline.
//!
//! # Responsibilities
//! - Collect a request, an ordered list of links and a terminal handler
//! - Run the chain once and hand back the final response
//!
//! # Design Decisions
//! - State moves Idle → Building → Running → Exhausted and never back
//! - Running an exhausted pipeline is a logic error, not a silent no-op

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;

use crate::pipeline::errors::PipelineError;
use crate::pipeline::middleware::{BoxError, Next, Pipe, PipelineServices};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Building,
    Running,
    Exhausted,
}

pub struct Pipeline {
    services: PipelineServices,
    request: Option<Request<Body>>,
    pipes: Vec<Pipe>,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(services: PipelineServices) -> Self {
        Self {
            services,
            request: None,
            pipes: Vec::new(),
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Set the request the chain will process.
    pub fn send(&mut self, request: Request<Body>) -> Result<&mut Self, PipelineError> {
        self.ensure_reusable()?;
        self.request = Some(request);
        Ok(self)
    }

    /// Append links. Order is execution order.
    pub fn through<I, P>(&mut self, pipes: I) -> Result<&mut Self, PipelineError>
    where
        I: IntoIterator<Item = P>,
        P: Into<Pipe>,
    {
        self.ensure_reusable()?;
        self.pipes.extend(pipes.into_iter().map(Into::into));
        self.state = PipelineState::Building;
        Ok(self)
    }

    /// Run every link, then `terminal`, and return the response.
    pub fn then<F>(&mut self, terminal: F) -> Result<Response, PipelineError>
    where
        F: Fn(Request<Body>) -> Result<Response, BoxError>,
    {
        self.ensure_reusable()?;
        let request = self.request.take().ok_or(PipelineError::MissingRequest)?;

        self.state = PipelineState::Running;
        let pipes = std::mem::take(&mut self.pipes);
        let response = Next::new(&pipes, &terminal, &self.services).run(request);
        self.state = PipelineState::Exhausted;

        Ok(response)
    }

    fn ensure_reusable(&self) -> Result<(), PipelineError> {
        match self.state {
            PipelineState::Exhausted | PipelineState::Running => Err(PipelineError::Exhausted),
            PipelineState::Idle | PipelineState::Building => Ok(()),
        }
    }
}
