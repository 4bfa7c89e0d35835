use code_call_lens::{AnnotationResolver, LensSettings};
use tower_lsp::{LspService, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod document;
mod position_finder;
mod project_settings;
mod server;

use crate::server::Backend;

#[tokio::main]
async fn main() {
    // stdout carries the protocol, so logs go to stderr
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "code_call_lens=info,code_call_lens_server=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let resolver = match AnnotationResolver::new(LensSettings::default()) {
        Ok(resolver) => resolver,
        Err(e) => {
            tracing::error!("couldn't build statistics client: {}", e);
            std::process::exit(1);
        }
    };

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::build(|client| Backend::new(client, resolver)).finish();

    Server::new(stdin, stdout, socket).serve(service).await;
}
