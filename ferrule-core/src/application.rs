// Application lifecycle and HTTP server

use crate::context::RequestContext;
use crate::lifecycle::{TeardownHook, TeardownHooks};
use crate::session::{NullSessionInterface, SessionInterface};
use crate::settings::AppSettings;
use crate::{Error, HttpRequest, HttpResponse};
use async_trait::async_trait;
use ferrule_config::ConfigManager;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode, body::Incoming as IncomingBody};
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Produces the response for a request
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, ctx: &mut RequestContext) -> Result<HttpResponse, Error>;
}

/// The main application struct
///
/// Every request goes through the same lifecycle:
/// open the session, run the handler, save the session, then run the
/// teardown hooks exactly once with whatever error ended the request.
pub struct Application {
    config: ConfigManager,
    settings: AppSettings,
    session_interface: Arc<dyn SessionInterface>,
    teardown: TeardownHooks,
}

impl Application {
    /// Build an application, registering framework defaults in `config`
    pub fn new(config: ConfigManager) -> Result<Self, Error> {
        AppSettings::apply_defaults(&config)?;
        let settings = AppSettings::from_config(&config)?;

        Ok(Self {
            config,
            settings,
            session_interface: Arc::new(NullSessionInterface),
            teardown: TeardownHooks::new(),
        })
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Replace the session interface
    pub fn set_session_interface(&mut self, interface: Arc<dyn SessionInterface>) {
        self.session_interface = interface;
    }

    pub fn session_interface(&self) -> &Arc<dyn SessionInterface> {
        &self.session_interface
    }

    pub fn add_teardown_hook(&mut self, hook: Arc<dyn TeardownHook>) {
        self.teardown.register(hook);
    }

    pub fn teardown_hooks(&self) -> &TeardownHooks {
        &self.teardown
    }

    /// Run one request through the full lifecycle
    pub async fn handle<H>(&self, request: HttpRequest, handler: &H) -> HttpResponse
    where
        H: RequestHandler + ?Sized,
    {
        let mut ctx = RequestContext::new(request);
        debug!(
            context = %ctx.id(),
            method = %ctx.request().method,
            path = %ctx.request().path,
            "Handling request"
        );

        let (response, failure) = self.dispatch(&mut ctx, handler).await;

        self.teardown.run(&mut ctx, failure.as_ref()).await;
        response
    }

    async fn dispatch<H>(
        &self,
        ctx: &mut RequestContext,
        handler: &H,
    ) -> (HttpResponse, Option<Error>)
    where
        H: RequestHandler + ?Sized,
    {
        let session = match self.session_interface.open_session(&self.settings, ctx).await {
            Ok(session) => session,
            Err(e) => return failed(ctx, "open session", e),
        };
        ctx.set_session(session);

        let (mut response, mut failure) = match handler.handle(ctx).await {
            Ok(response) => (response, None),
            Err(e) => failed(ctx, "handler", e),
        };

        if let Some(session) = ctx.take_session() {
            let saved = self
                .session_interface
                .save_session(&self.settings, ctx, &session, &mut response)
                .await;
            ctx.set_session(session);

            if let Err(e) = saved {
                (response, failure) = failed(ctx, "save session", e);
            }
        }

        (response, failure)
    }

    /// Serve HTTP/1 on `addr` until the process exits
    pub async fn serve<H>(self: Arc<Self>, addr: SocketAddr, handler: Arc<H>) -> Result<(), Error>
    where
        H: RequestHandler + 'static,
    {
        let listener = TcpListener::bind(addr).await?;
        self.serve_with_shutdown(listener, handler, std::future::pending())
            .await
    }

    /// Serve HTTP/1 on an already bound listener until `shutdown` resolves
    pub async fn serve_with_shutdown<H, F>(
        self: Arc<Self>,
        listener: TcpListener,
        handler: Arc<H>,
        shutdown: F,
    ) -> Result<(), Error>
    where
        H: RequestHandler + 'static,
        F: Future<Output = ()> + Send,
    {
        info!(addr = %listener.local_addr()?, "Server listening");
        tokio::pin!(shutdown);

        loop {
            let (stream, _) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = &mut shutdown => {
                    info!("Server shutting down");
                    return Ok(());
                }
            };
            let io = TokioIo::new(stream);
            let app = self.clone();
            let handler = handler.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<IncomingBody>| {
                    let app = app.clone();
                    let handler = handler.clone();
                    async move { handle_hyper_request(req, app, handler).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!(error = ?err, "Error serving connection");
                }
            });
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("settings", &self.settings)
            .field("teardown", &self.teardown)
            .finish()
    }
}

fn failed(ctx: &RequestContext, stage: &str, err: Error) -> (HttpResponse, Option<Error>) {
    error!(context = %ctx.id(), stage, error = %err, "Request failed");
    (HttpResponse::from_error(&err), Some(err))
}

/// Convert a hyper request, run it through the application and convert back
async fn handle_hyper_request<H>(
    req: Request<IncomingBody>,
    app: Arc<Application>,
    handler: Arc<H>,
) -> Result<Response<Full<bytes::Bytes>>, hyper::Error>
where
    H: RequestHandler + 'static,
{
    let mut request = HttpRequest::new(req.method().to_string(), req.uri().path());

    if let Some(query) = req.uri().query() {
        request.query_params =
            serde_urlencoded::from_str::<HashMap<String, String>>(query).unwrap_or_default();
    }

    for (name, value) in req.headers() {
        if let Ok(value_str) = value.to_str() {
            request
                .headers
                .insert(name.as_str().to_ascii_lowercase(), value_str.to_string());
        }
    }

    request.body = req.collect().await?.to_bytes().to_vec();

    let response = app.handle(request, handler.as_ref()).await;

    let mut builder = Response::builder().status(response.status);
    for (key, value) in &response.headers {
        builder = builder.header(key, value);
    }
    for cookie in response.set_cookie_headers() {
        builder = builder.header("Set-Cookie", cookie);
    }

    let body = Full::new(bytes::Bytes::from(response.body));
    Ok(builder.body(body).unwrap_or_else(|err| {
        error!(error = %err, "Invalid response");
        let mut fallback = Response::new(Full::new(bytes::Bytes::new()));
        *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        fallback
    }))
}
