//! Messaging gateway connection management.

use std::sync::Arc;

use mockable::Clock;
use tracing::{info, warn};

use super::port_errors::{map_gateway_config_error, map_messaging_error};
use super::ports::{GatewayConfigRepository, MessagingGateway};
use super::{
    Error, GatewayConfig, GatewayCredentials, GatewayInstance, Role, SessionContext, User,
};

/// Outcome of a successful configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConnection {
    pub config: GatewayConfig,
    pub instances: Vec<GatewayInstance>,
}

/// Configures the gateway and lists its instances. Administrators only.
#[derive(Clone)]
pub struct GatewayConnectionService<R, G> {
    configs: Arc<R>,
    gateway: Arc<G>,
    context: Arc<SessionContext>,
    clock: Arc<dyn Clock>,
}

impl<R, G> GatewayConnectionService<R, G> {
    /// Service using the gateway and stored configuration given.
    pub fn new(
        configs: Arc<R>,
        gateway: Arc<G>,
        context: Arc<SessionContext>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            configs,
            gateway,
            context,
            clock,
        }
    }

    fn require_admin(&self) -> Result<User, Error> {
        let actor = self.context.require_user()?;
        if actor.role() == Role::Admin {
            Ok(actor)
        } else {
            Err(Error::forbidden("gateway connections are restricted to administrators"))
        }
    }
}

impl<R, G> GatewayConnectionService<R, G>
where
    R: GatewayConfigRepository,
    G: MessagingGateway,
{
    /// Probe the server, then store the settings and list its instances.
    ///
    /// Nothing is stored unless the probe reports a healthy server.
    pub async fn configure(
        &self,
        server_url: &str,
        api_key: &str,
    ) -> Result<GatewayConnection, Error> {
        self.require_admin()?;
        let credentials = GatewayCredentials::new(server_url, api_key)
            .map_err(|err| Error::invalid_request(err.to_string()))?;

        let healthy = self
            .gateway
            .probe(&credentials)
            .await
            .map_err(map_messaging_error)?;
        if !healthy {
            warn!(server = credentials.server_url(), "gateway probe reported unhealthy");
            return Err(Error::service_unavailable(
                "the server answered but did not report a healthy status",
            ));
        }

        let config = self.save(&credentials).await?;
        info!(server = credentials.server_url(), "gateway configuration saved");
        let instances = self
            .gateway
            .list_instances(&credentials)
            .await
            .map_err(map_messaging_error)?;
        Ok(GatewayConnection { config, instances })
    }

    /// Instances on the stored server; empty when nothing is configured.
    pub async fn instances(&self) -> Result<Vec<GatewayInstance>, Error> {
        self.require_admin()?;
        let Some(config) = self
            .configs
            .find_first()
            .await
            .map_err(map_gateway_config_error)?
        else {
            return Ok(Vec::new());
        };
        self.gateway
            .list_instances(&config.credentials)
            .await
            .map_err(map_messaging_error)
    }

    async fn save(&self, credentials: &GatewayCredentials) -> Result<GatewayConfig, Error> {
        let now = self.clock.utc();
        let existing = self
            .configs
            .find_first()
            .await
            .map_err(map_gateway_config_error)?;
        match existing {
            Some(current) => self.configs.update(current.id, credentials, now).await,
            None => self.configs.insert(credentials, now).await,
        }
        .map_err(map_gateway_config_error)
    }
}
