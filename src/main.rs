// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use k8s_openapi::ByteString;
use kube::config::KubeConfigOptions;
use kube::Client;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use fleet_manager::config::{watch_properties, Config};
use fleet_manager::constants::OPERATOR_NAME;
use fleet_manager::events::KubeEventPublisher;
use fleet_manager::kubernetes::rbac::{bootstrap_rbac, service_account_token};
use fleet_manager::kubernetes::client::pem_bundle;
use fleet_manager::kubernetes::{wait_for_crds, KubeConnector};
use fleet_manager::reconcilers::{
    ApplicationReconciler, ClusterReconciler, Context, ManagedNamespaceReconciler,
};
use fleet_manager::registration::{self, ClusterRegistration, RegistrationConfig, Registrar};
use fleet_manager::types::TlsClientConfig;

/// Multi-cluster fleet manager
#[derive(clap::Parser, Clone, Debug)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Clone, Debug)]
enum Commands {
    /// Run the operator (default)
    Run,
    /// Create the fleet manager service account in a cluster and print its registration request
    Bootstrap {
        /// Kubeconfig context with admin access to the cluster
        #[arg(short, long)]
        context: String,
        /// Name to register the cluster under
        #[arg(short, long)]
        name: String,
        /// Installation type, e.g. AWS
        #[arg(long = "type")]
        cloud: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match Cli::parse().command.unwrap_or(Commands::Run) {
        Commands::Run => run().await,
        Commands::Bootstrap { context, name, cloud } => bootstrap(context, name, cloud).await,
    }
}

async fn run() -> Result<()> {
    info!("Starting fleet manager");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: manager_namespace={}, validation_frequency={:?}",
        config.manager_namespace, config.validation_frequency
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for fleet manager CRDs to become available...");
    wait_for_crds(&client).await?;

    let (properties_tx, properties_rx) = watch::channel(config.properties());
    let ctx = Arc::new(Context {
        client: client.clone(),
        manager_namespace: config.manager_namespace.clone(),
        connector: Arc::new(KubeConnector::new(client.clone())),
        events: Arc::new(KubeEventPublisher::new(client.clone(), OPERATOR_NAME)),
        properties: properties_rx,
    });

    let cluster_reconciler = ClusterReconciler::new(ctx.clone());
    let namespace_reconciler = ManagedNamespaceReconciler::new(ctx.clone());
    let application_reconciler = ApplicationReconciler::new(ctx);
    let registrar = Registrar::new(client.clone(), config.manager_namespace.clone());
    let registration_addr = config.registration_addr;

    info!("Starting reconcilers...");

    tokio::try_join!(
        cluster_reconciler.run(),
        namespace_reconciler.run(),
        application_reconciler.run(),
        watch_properties(client, config, properties_tx),
        registration::serve(registrar, registration_addr)
    )?;

    // Reconcilers run forever
    warn!("All reconcilers stopped unexpectedly");
    Ok(())
}

async fn bootstrap(context: String, name: String, cloud: Option<String>) -> Result<()> {
    let options = KubeConfigOptions {
        context: Some(context.clone()),
        ..Default::default()
    };
    let kube_config = kube::Config::from_kubeconfig(&options)
        .await
        .with_context(|| format!("Failed to load kubeconfig context {}", context))?;
    let host = kube_config.cluster_url.to_string();
    let insecure = kube_config.accept_invalid_certs;
    let ca_data = kube_config
        .root_cert
        .as_deref()
        .map(|certs| ByteString(pem_bundle(certs)));
    let client = Client::try_from(kube_config)?;

    info!("Bootstrapping fleet manager access in context {}", context);
    bootstrap_rbac(&client).await?;
    let bearer_token = service_account_token(&client).await?;

    let registration = ClusterRegistration {
        name,
        cloud,
        config: RegistrationConfig {
            host,
            bearer_token,
            tls_client_config: TlsClientConfig {
                insecure,
                ca_data,
                ..Default::default()
            },
        },
    };
    println!("{}", serde_json::to_string_pretty(&registration)?);
    Ok(())
}
