//! Send a single HTTP request and watch it on the wire.
//!
//! The response status and body are printed to standard output, while the
//! raw bytes of the exchange are mirrored to standard error.
//! Use `--help` to see the options.

use std::net::IpAddr;

use clap::{arg, ArgAction};
use http::Uri;
use http_body_util::BodyExt as _;
use tokio::io::AsyncWriteExt as _;
use tracing_subscriber::EnvFilter;
use wiretap::dial::StaticResolver;
use wiretap::tls::TlsConfig;
use wiretap::{Body, Client};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let _ = rustls::crypto::ring::default_provider().install_default();

    let args = clap::Command::new("inspect")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Send an HTTP request and mirror its wire traffic to stderr")
        .args([
            clap::Arg::new("uri").help("Target URI").required(true),
            arg!(-X --method [METHOD] "HTTP method to use").default_value("GET"),
            arg!(-d --body [BODY] "HTTP body to send"),
            arg!(-H --header [HEADER]... "HTTP headers to send, as `Name: value`"),
            arg!(--resolve [ENTRY]... "Pin a host to an address, as `host:ip`"),
            arg!(--tls [CERTIFICATE] "Path to a PEM CA root to trust instead of the platform roots"),
            clap::Arg::new("insecure-hostname")
                .long("insecure-hostname")
                .help("Verify the certificate chain but not the host name")
                .action(ArgAction::SetTrue),
        ])
        .get_matches();

    let mut tls = match args.get_one::<String>("tls") {
        Some(path) => {
            let mut roots = rustls::RootCertStore::empty();
            let (_, cert) = pem_rfc7468::decode_vec(&std::fs::read(path)?)
                .map_err(|error| format!("{path}: {error}"))?;
            roots.add(rustls::pki_types::CertificateDer::from(cert))?;
            TlsConfig::new(roots)
        }
        None => TlsConfig::native_roots(),
    };
    if args.get_flag("insecure-hostname") {
        tls = tls.without_hostname_verification();
    }

    let mut resolver = StaticResolver::new();
    if let Some(entries) = args.get_many::<String>("resolve") {
        for entry in entries {
            let (host, ip) = entry
                .rsplit_once(':')
                .ok_or_else(|| format!("invalid --resolve entry: {entry}"))?;
            let ip: IpAddr = ip.trim_matches(|c| c == '[' || c == ']').parse()?;
            resolver.insert(host, ip);
        }
    }

    let client = Client::builder()
        .with_tls(tls)
        .with_resolver(resolver)
        .build();

    let uri: Uri = args
        .get_one::<String>("uri")
        .expect("uri argument is required")
        .parse()?;
    let method: http::Method = args
        .get_one::<String>("method")
        .expect("method has a default")
        .parse()?;

    let mut request = http::Request::builder().method(method).uri(uri);
    if let Some(headers) = args.get_many::<String>("header") {
        for header in headers {
            let (name, value) = header
                .split_once(':')
                .ok_or_else(|| format!("invalid header: {header}"))?;
            request = request.header(name.trim(), value.trim());
        }
    }

    let body = args
        .get_one::<String>("body")
        .map(|body| Body::from(body.clone()))
        .unwrap_or_default();
    let request = request.body(body)?;

    let response = client.request(request).await?;
    let (parts, body) = response.into_parts();
    let body = body.collect().await?.to_bytes();

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(format!("{} {:?}\n", parts.status, parts.version).as_bytes())
        .await?;
    stdout.write_all(&body).await?;
    stdout.flush().await?;

    Ok(())
}
