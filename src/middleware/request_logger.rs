use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
};
use futures::future::LocalBoxFuture;
use std::rc::Rc;
use std::time::Instant;
use tracing::Instrument;

/// Request logging middleware
///
/// Opens a `tracing` span carrying a fresh request id for every request and
/// records method, path, final status and latency. Rejections raised by
/// inner middleware (e.g. the session guard) are logged with their status.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(RequestLoggerService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestLoggerService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start_time = Instant::now();
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!(
            "http_request",
            %request_id,
            method = %req.method(),
            path = %req.path(),
        );

        let service = self.service.clone();

        Box::pin(
            async move {
                tracing::debug!("Request started");

                match service.call(req).await {
                    Ok(res) => {
                        tracing::info!(
                            status = res.status().as_u16(),
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            "Request completed"
                        );
                        Ok(res)
                    }
                    Err(err) => {
                        tracing::info!(
                            status = err.as_response_error().status_code().as_u16(),
                            elapsed_ms = start_time.elapsed().as_millis() as u64,
                            "Request rejected"
                        );
                        Err(err)
                    }
                }
            }
            .instrument(span),
        )
    }
}
