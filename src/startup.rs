use std::net::TcpListener;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::App;
use actix_web::HttpServer;
use tracing_actix_web::TracingLogger;

use crate::configuration::Settings;
use crate::gateway::Gateway;
use crate::routes::health_check;
use crate::routes::join_waitlist;
use crate::routes::list_waitlist;
use crate::routes::method_not_allowed;

/// Wrapper for actix's `Server` with access to the bound port. Not to be
/// confused with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
}

impl Application {
    /// Bind the listener and build the gateway for the configured provider.
    /// Missing provider secrets do not prevent startup.
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(addr)?;

        // port 0 is resolved by the OS; keep the actual one
        let port = listener.local_addr()?.port();

        let gateway = Gateway::build(&cfg);
        let server = run(listener, gateway)?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    gateway: Gateway,
) -> Result<Server, anyhow::Error> {
    // `Data` is an `Arc`; every worker gets a handle to the same gateway (and
    // therefore the same pooled `reqwest::Client`)
    let gateway = web::Data::new(gateway);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .service(
                web::resource("/api/waitlist")
                    .route(web::get().to(list_waitlist))
                    .route(web::post().to(join_waitlist))
                    .default_service(web::to(method_not_allowed)),
            )
            .app_data(gateway.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
