//! # Tier Middleware
//!
//! A `tower` layer enforcing a [`TierPolicy`] in front of any tonic service.
//!
//! Tonic interceptors only see a `Request<()>` with its metadata, not the method being
//! called. The check therefore runs one level lower, on the raw `http::Request`, where
//! the path (`/package.Service/Method`) is available, exactly like the generated server
//! code routes requests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiergate_core::{PolicyConfig, TierLayer, TierPolicy};
//! use tonic::service::Routes;
//! use tower::Layer;
//!
//! # fn run(descriptor_set: &[u8], routes: Routes) -> Result<(), Box<dyn std::error::Error>> {
//! let policy = TierPolicy::from_file_descriptor_set(descriptor_set, &PolicyConfig::default())?;
//! let guarded = TierLayer::new(policy).layer(routes);
//! # Ok(())
//! # }
//! ```
use crate::policy::{Requirement, TierPolicy};
use futures_util::future::{Either, Ready, ready};
use std::task::{Context, Poll};
use tonic::{Status, metadata::MetadataMap};
use tower::{Layer, Service};

/// Wraps services in a [`TierService`].
#[derive(Debug, Clone)]
pub struct TierLayer {
    policy: TierPolicy,
}

impl TierLayer {
    pub fn new(policy: TierPolicy) -> Self {
        Self { policy }
    }
}

impl<S> Layer<S> for TierLayer {
    type Service = TierService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TierService {
            inner,
            policy: self.policy.clone(),
        }
    }
}

/// A service rejecting requests whose caller tier does not satisfy the [`TierPolicy`].
///
/// Rejected requests are answered with a trailers-only gRPC response and never reach
/// the inner service.
#[derive(Debug, Clone)]
pub struct TierService<S> {
    inner: S,
    policy: TierPolicy,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for TierService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    ResBody: Default,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Either<Ready<Result<Self::Response, Self::Error>>, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: http::Request<ReqBody>) -> Self::Future {
        let path = req.uri().path();
        let metadata = match self.policy.requirement(path) {
            Requirement::MinTier(_) => MetadataMap::from_headers(req.headers().clone()),
            Requirement::Open | Requirement::Unknown => MetadataMap::new(),
        };

        match self.policy.authorize(path, &metadata) {
            Ok(()) => {
                tracing::debug!(path, "Request authorized");
                Either::Right(self.inner.call(req))
            }
            Err(err) => {
                tracing::info!(path, reason = %err, "Request rejected");
                Either::Left(ready(Ok(Status::from(err).into_http())))
            }
        }
    }
}
