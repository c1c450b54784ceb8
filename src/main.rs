use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use log::{error, info};

use tls_site_validation::admin::{AdminClient, JsonFileAdminClient, share};
use tls_site_validation::config::{ValidationConfig, load_config};
use tls_site_validation::domain::normalize_hostname_for_display;
use tls_site_validation::storage::SqliteCertificateStore;
use tls_site_validation::{CertificateInfo, SessionFactory, SiteId, ValidationTarget};

#[derive(Debug, Parser)]
#[command(
    name = "tls-site-validation",
    version,
    about = "Expose a certificate on a web server long enough to validate a host name"
)]
struct Cli {
    /// Optional config file (JSON). If omitted, loads ./tls-validation.json if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the server configuration document from the config file.
    #[arg(long, global = true)]
    server_config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List sites and bindings of the configured server
    Sites,
    /// Report whether the server supports SNI validation bindings
    Eligible,
    /// Install a certificate for validation, hold it, then remove it again
    Expose {
        /// PEM file with the validation certificate
        #[arg(long)]
        cert: PathBuf,
        /// Host name being validated
        #[arg(long)]
        identifier: String,
        /// Named certificate store; omit for a store-less (central) binding
        #[arg(long)]
        store_name: Option<String>,
        /// Site dedicated to validation bindings
        #[arg(long)]
        validation_site_id: Option<SiteId>,
        /// Site the certificate is deployed to
        #[arg(long)]
        target_site_id: Option<SiteId>,
        /// Seconds to keep the binding live before removing it
        #[arg(long, default_value_t = 30)]
        hold_secs: u64,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()) {
        error!("{err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(path) = cli.server_config {
        config.server_config_path = path;
    }

    match cli.command {
        Commands::Sites => list_sites(&config),
        Commands::Eligible => report_eligibility(&config),
        Commands::Expose {
            cert,
            identifier,
            store_name,
            validation_site_id,
            target_site_id,
            hold_secs,
        } => {
            let target = ValidationTarget::new(&identifier)?
                .with_validation_site(validation_site_id)
                .with_target_site(target_site_id);
            expose(
                &config,
                &target,
                &cert,
                store_name,
                Duration::from_secs(hold_secs),
            )
        }
    }
}

fn open_admin(config: &ValidationConfig) -> Result<JsonFileAdminClient> {
    JsonFileAdminClient::open(&config.server_config_path).with_context(|| {
        format!(
            "failed to load server configuration {}",
            config.server_config_path.display()
        )
    })
}

fn list_sites(config: &ValidationConfig) -> Result<()> {
    let admin = open_admin(config)?;
    println!(
        "{} (server version {})",
        admin.path().display(),
        admin.server_version()
    );
    for site in admin.list_sites() {
        println!("{:>5}  {}  ({})", site.id, site.name, site.physical_path);
        for binding in &site.bindings {
            let host = normalize_hostname_for_display(&binding.host);
            let cert = binding
                .certificate_hash
                .as_ref()
                .map(|hash| format!(" cert={}", hex::encode_upper(hash)))
                .unwrap_or_default();
            println!(
                "       {} {}:{}:{} flags={}{}",
                binding.protocol, binding.ip, binding.port, host, binding.ssl_flags, cert
            );
        }
    }
    Ok(())
}

fn report_eligibility(config: &ValidationConfig) -> Result<()> {
    let admin = open_admin(config)?;
    let version = admin.server_version();
    let required = config.options.min_server_major_version;
    if SessionFactory::is_eligible(version, required) {
        println!("server {version} supports SNI validation bindings");
        Ok(())
    } else {
        Err(anyhow!(
            "server {version} cannot host validation bindings (requires {required}.0 or later)"
        ))
    }
}

fn expose(
    config: &ValidationConfig,
    target: &ValidationTarget,
    cert_path: &Path,
    store_name: Option<String>,
    hold: Duration,
) -> Result<()> {
    let pem_text = fs::read_to_string(cert_path)
        .with_context(|| format!("failed to read certificate {}", cert_path.display()))?;
    let certificate = CertificateInfo::from_pem(&pem_text)?.with_store_name(store_name);

    let store = SqliteCertificateStore::open(&config.certificate_store_path)?;
    let factory = SessionFactory::new(
        share(open_admin(config)?),
        Arc::new(store),
        config.options.clone(),
    );
    let mut session = factory.create(target)?;
    info!(
        "session {} exposing {} on {}",
        session.id(),
        certificate.thumbprint(),
        certificate.primary_host().unwrap_or(&target.identifier)
    );

    let installed = session.install(&certificate);
    if installed.is_ok() {
        if let Some(site) = session.site().site_id() {
            info!("holding binding on site {} for {}s", site, hold.as_secs());
        }
        thread::sleep(hold);
    }
    // Cleanup runs even after a failed install; partial changes must not leak.
    let removed = session.remove(&certificate);

    installed.context("install failed")?;
    removed.context("remove failed")?;
    Ok(())
}
