use std::io;
use std::path::PathBuf;
use std::time::Duration;

use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, middleware, web};
use clap::Parser;
use kura::Config;
use kura::api::PipelineConfig;
use kura::config::{DEFAULT_GIT_PREFIX, DEFAULT_REPOS_PATH, DEFAULT_URL_PREFIX};
use kura::manager::RepositoryManager;
use log::info;

#[derive(Parser)]
struct Args {
    /// Directory holding repositories and groups
    #[arg(long, default_value = DEFAULT_REPOS_PATH)]
    repos_path: PathBuf,

    /// Mount point of the repository management API
    #[arg(long, default_value = DEFAULT_URL_PREFIX)]
    url_prefix: String,

    /// Mount point of the Git Smart HTTP transport
    #[arg(long, default_value = DEFAULT_GIT_PREFIX)]
    git_prefix: String,

    /// Client request timeout in seconds
    #[arg(long, default_value = "600")]
    request_timeout: u64,

    /// Client disconnect timeout in seconds
    #[arg(long, default_value = "60")]
    disconnect_timeout: u64,

    /// Keep alive timeout in seconds
    #[arg(long, default_value = "120")]
    keep_alive: u64,

    /// Number of worker threads
    #[arg(long, default_value = "1")]
    workers: usize,

    /// Server hostname
    #[arg(long, default_value = "localhost")]
    hostname: String,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0:5000")]
    bind: String,
}

impl Args {
    fn config(&self) -> io::Result<Config> {
        let config = Config::new(&self.repos_path)
            .with_url_prefix(&self.url_prefix)
            .with_git_prefix(&self.git_prefix);

        if config.git_prefix.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "--git-prefix must not be empty"));
        }
        if config.git_prefix == config.url_prefix {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "--git-prefix and --url-prefix must differ",
            ));
        }

        Ok(config)
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    let args = Args::parse();
    let config = args.config()?;

    std::fs::create_dir_all(&config.repos_path)?;
    info!(
        "Serving repositories from {} (api: {}, git: {})",
        config.repos_path.display(),
        config.url_prefix,
        config.git_prefix
    );

    let manager = web::Data::new(RepositoryManager::new(&config.repos_path));
    let pipelines = web::Data::new(PipelineConfig::builder().build());

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::new(r#"%a "%r" %s %b %T"#))
            .wrap(middleware::NormalizePath::trim())
            .app_data(manager.clone())
            .app_data(pipelines.clone())
            .configure(kura::configure(&config))
    })
    .client_request_timeout(Duration::from_secs(args.request_timeout))
    .client_disconnect_timeout(Duration::from_secs(args.disconnect_timeout))
    .keep_alive(Duration::from_secs(args.keep_alive))
    .server_hostname(&args.hostname)
    .workers(args.workers)
    .bind(&args.bind)?
    .run()
    .await
}
